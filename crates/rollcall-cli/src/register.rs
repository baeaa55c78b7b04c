//! Student registration: capture face descriptors and store them.

use anyhow::Result;
use rollcall_core::{Descriptor, FaceEncoder, FaceRegion};
use rollcall_hw::{save_face_crop, Frame, FrameSource, Sequence};
use rollcall_store::Ledger;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Why a frame could not be used for registration. Reported, then retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureIssue {
    NoFace,
    MultipleFaces(usize),
    EncodingFailed,
}

impl fmt::Display for CaptureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureIssue::NoFace => f.write_str("No face detected. Please face the camera."),
            CaptureIssue::MultipleFaces(_) => {
                f.write_str("Multiple faces detected. Please ensure only one face is in the frame.")
            }
            CaptureIssue::EncodingFailed => f.write_str("Failed to encode face. Please try again."),
        }
    }
}

/// Identity fields supplied on the command line.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub student_id: String,
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Descriptors collected by a multi-capture registration.
    pub samples: usize,
    /// Minimum spacing between two multi-capture samples.
    pub interval: Duration,
    /// Frames read before giving up.
    pub max_attempts: usize,
    pub image_dir: PathBuf,
}

/// A usable sample: exactly one face that produced a descriptor.
struct Sample {
    frame: Frame,
    region: FaceRegion,
    descriptor: Descriptor,
}

/// Prints each capture issue once until a different one occurs.
#[derive(Default)]
struct IssueReporter {
    last: Option<CaptureIssue>,
}

impl IssueReporter {
    fn report(&mut self, issue: CaptureIssue) {
        if self.last != Some(issue) {
            println!("{issue}");
            self.last = Some(issue);
        }
        tracing::debug!(?issue, "frame rejected");
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

fn sample_frame<E: FaceEncoder>(
    encoder: &mut E,
    frame: Frame,
) -> Result<std::result::Result<Sample, CaptureIssue>> {
    let faces = encoder.detect(&frame.image)?;
    let region = match faces.as_slice() {
        [] => return Ok(Err(CaptureIssue::NoFace)),
        [region] => region.clone(),
        many => return Ok(Err(CaptureIssue::MultipleFaces(many.len()))),
    };
    match encoder.encode(&frame.image, &region)? {
        Some(descriptor) => Ok(Ok(Sample { frame, region, descriptor })),
        None => Ok(Err(CaptureIssue::EncodingFailed)),
    }
}

/// Register from the first frame with exactly one encodable face.
///
/// Returns `false` when the camera fails, the stop flag is raised, or no
/// usable frame arrives within `max_attempts`.
pub fn register_single<S, E>(
    source: &mut S,
    encoder: &mut E,
    ledger: &Ledger,
    student: &Enrollment,
    settings: &CaptureSettings,
    stop: &AtomicBool,
) -> Result<bool>
where
    S: FrameSource,
    E: FaceEncoder,
{
    println!("Starting registration for student {}: {}", student.student_id, student.name);

    let mut issues = IssueReporter::default();
    for _ in 0..settings.max_attempts {
        if stop.load(Ordering::Relaxed) {
            println!("Registration cancelled");
            return Ok(false);
        }
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "camera read failed");
                println!("Failed to grab frame");
                return Ok(false);
            }
        };

        match sample_frame(encoder, frame)? {
            Ok(sample) => {
                let path = save_face_crop(
                    &sample.frame.image,
                    &sample.region,
                    &settings.image_dir,
                    &student.student_id,
                    Sequence::Single,
                )?;
                let outcome = ledger.register_student(
                    &student.student_id,
                    &student.name,
                    &student.department,
                    &[sample.descriptor],
                )?;
                println!("{outcome}");
                println!("Face image saved to {}", path.display());
                return Ok(true);
            }
            Err(issue) => issues.report(issue),
        }
    }

    tracing::warn!(attempts = settings.max_attempts, "no usable frame for registration");
    println!("No usable face captured after {} frames", settings.max_attempts);
    Ok(false)
}

/// Collect up to `settings.samples` descriptors spaced by `settings.interval`
/// and register them together. Zero collected is a failure.
pub fn register_multi<S, E>(
    source: &mut S,
    encoder: &mut E,
    ledger: &Ledger,
    student: &Enrollment,
    settings: &CaptureSettings,
    stop: &AtomicBool,
) -> Result<bool>
where
    S: FrameSource,
    E: FaceEncoder,
{
    println!(
        "Starting multi-image registration for student {}: {}",
        student.student_id, student.name
    );
    println!(
        "Will capture {} images - please rotate your face slowly in different angles",
        settings.samples
    );

    let mut descriptors = Vec::with_capacity(settings.samples);
    let mut issues = IssueReporter::default();
    let mut last_capture: Option<Instant> = None;

    for _ in 0..settings.max_attempts {
        if descriptors.len() >= settings.samples {
            break;
        }
        if stop.load(Ordering::Relaxed) {
            println!("Registration cancelled");
            break;
        }
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "camera read failed");
                println!("Failed to grab frame");
                break;
            }
        };
        if let Some(last) = last_capture {
            if frame.timestamp.saturating_duration_since(last) < settings.interval {
                continue;
            }
        }

        match sample_frame(encoder, frame)? {
            Ok(sample) => {
                let n = descriptors.len() + 1;
                save_face_crop(
                    &sample.frame.image,
                    &sample.region,
                    &settings.image_dir,
                    &student.student_id,
                    Sequence::Index(n),
                )?;
                println!("Captured image {n}/{}", settings.samples);
                last_capture = Some(sample.frame.timestamp);
                descriptors.push(sample.descriptor);
                issues.clear();
            }
            Err(issue) => issues.report(issue),
        }
    }

    if descriptors.is_empty() {
        println!("No face encodings captured. Registration failed.");
        return Ok(false);
    }

    println!("Captured {} images successfully", descriptors.len());
    let outcome = ledger.register_student(
        &student.student_id,
        &student.name,
        &student.department,
        &descriptors,
    )?;
    println!("{outcome}");
    println!("Registered student with {} different face angles", descriptors.len());
    Ok(true)
}

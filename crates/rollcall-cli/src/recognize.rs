//! The recognition loop: frames in, attendance marks out.

use crate::overlay::{self, LabeledFace};
use anyhow::{Context, Result};
use chrono::Local;
use rollcall_core::{
    AttendanceLedger, Classification, Decision, EuclideanMatcher, FaceEncoder, MarkedStudent,
    Matcher, RosterEntry, RunContext, Scope, SessionPolicy,
};
use rollcall_hw::FrameSource;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub threshold: f32,
    /// Every n-th frame is detected and matched.
    pub process_every: usize,
    pub max_frames: Option<u64>,
    /// Annotated frame written here after each processed frame.
    pub preview: Option<PathBuf>,
}

/// What a finished run reports to the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub scope: Scope,
    pub marked: Vec<MarkedStudent>,
    pub frames: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Session(id) => writeln!(f, "Attendance Summary for Lecture: {id}")?,
            Scope::Date(date) => writeln!(f, "Attendance Summary for {date}")?,
        }
        write!(f, "Total students marked present: {}", self.marked.len())?;
        for student in &self.marked {
            write!(f, "\n- {} ({})", student.name, student.student_id)?;
        }
        Ok(())
    }
}

/// Run recognition until the camera fails, `stop` is raised, or
/// `max_frames` frames have been read.
///
/// Ledger and encoder failures abort the run; a failed camera read only
/// ends it.
#[allow(clippy::too_many_arguments)]
pub fn run_recognition<S, E, L>(
    source: &mut S,
    encoder: &mut E,
    ledger: &L,
    roster: &[RosterEntry],
    policy: &SessionPolicy,
    mut ctx: RunContext,
    settings: &LoopSettings,
    stop: &AtomicBool,
) -> Result<RunSummary>
where
    S: FrameSource,
    E: FaceEncoder,
    L: AttendanceLedger,
    L::Error: std::error::Error + Send + Sync + 'static,
{
    let scope = ctx.scope();
    let matcher = EuclideanMatcher;
    let process_every = settings.process_every.max(1) as u64;
    let mut frames: u64 = 0;
    let mut faces: Vec<LabeledFace> = Vec::new();

    tracing::info!(%scope, roster = roster.len(), process_every, "recognition started");

    loop {
        if stop.load(Ordering::Relaxed) {
            tracing::info!("stop requested");
            break;
        }
        if settings.max_frames.is_some_and(|max| frames >= max) {
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
        frames += 1;
        if (frames - 1) % process_every != 0 {
            continue;
        }

        faces.clear();
        for region in encoder.detect(&frame.image)? {
            let classification = match encoder.encode(&frame.image, &region)? {
                Some(descriptor) => matcher.classify(&descriptor, roster, settings.threshold),
                None => Classification::Unknown,
            };

            match policy.evaluate(&mut ctx, &classification, frame.timestamp, ledger)? {
                Decision::Marked(outcome) => {
                    println!("{outcome} at {}", Local::now().format("%H:%M:%S"));
                }
                Decision::AlreadyMarked { student_id, name } => {
                    println!("Already marked attendance for {name} ({student_id})");
                }
                Decision::Ignored | Decision::CoolingDown => {}
            }

            tracing::trace!(
                label = %overlay::label(&classification, &ctx),
                frame = frame.sequence,
                "face"
            );
            faces.push(LabeledFace { region, classification });
        }

        if let Some(path) = &settings.preview {
            let mut annotated = frame.image;
            overlay::annotate(&mut annotated, &faces);
            annotated
                .save(path)
                .with_context(|| format!("failed to write preview {}", path.display()))?;
        }
    }

    tracing::info!(frames, marked = ctx.marked().len(), "recognition finished");
    Ok(RunSummary {
        scope,
        marked: ctx.marked().to_vec(),
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCamera, FakeEncoder, Scene};
    use rollcall_core::Descriptor;
    use rollcall_store::{Ledger, ReportFilter};
    use std::time::Duration;

    fn entry(student_id: &str, name: &str, values: &[f32]) -> RosterEntry {
        RosterEntry {
            student_id: student_id.into(),
            name: name.into(),
            descriptor: Descriptor::new(values.to_vec()),
        }
    }

    fn roster() -> Vec<RosterEntry> {
        vec![entry("S1", "Ada", &[0.0, 0.0]), entry("S2", "Grace", &[1.0, 1.0])]
    }

    fn settings() -> LoopSettings {
        LoopSettings { threshold: 0.5, process_every: 1, max_frames: None, preview: None }
    }

    fn run(
        frames: usize,
        scenes: Vec<Scene>,
        ledger: &Ledger,
        policy: SessionPolicy,
        session: Option<&str>,
        settings: &LoopSettings,
    ) -> (RunSummary, FakeEncoder) {
        let mut camera = FakeCamera::new(frames);
        let mut encoder = FakeEncoder::new(scenes);
        let summary = run_recognition(
            &mut camera,
            &mut encoder,
            ledger,
            &roster(),
            &policy,
            RunContext::new(session.map(String::from)),
            settings,
            &AtomicBool::new(false),
        )
        .unwrap();
        (summary, encoder)
    }

    #[test]
    fn test_marks_each_student_once() {
        let ledger = Ledger::open_in_memory().unwrap();
        let scenes = vec![
            Scene::one(&[0.1, 0.0]),
            Scene::Faces(vec![Some(vec![0.1, 0.0]), Some(vec![0.9, 1.0])]),
        ];

        let policy = SessionPolicy::default();
        let (summary, _) = run(10, scenes, &ledger, policy, Some("L1"), &settings());

        assert_eq!(summary.frames, 10);
        let ids: Vec<_> = summary.marked.iter().map(|m| m.student_id.as_str()).collect();
        assert_eq!(ids, ["S1", "S2"]);
        let records = ledger.attendance_report(&ReportFilter::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.session_id() == Some("L1")));
    }

    #[test]
    fn test_unknown_faces_are_not_marked() {
        let ledger = Ledger::open_in_memory().unwrap();
        let scenes = vec![Scene::one(&[5.0, 5.0]), Scene::Faces(vec![None])];

        let policy = SessionPolicy::default();
        let (summary, _) = run(4, scenes, &ledger, policy, Some("L1"), &settings());

        assert!(summary.marked.is_empty());
        assert!(ledger.attendance_report(&ReportFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_date_scope_without_session() {
        let ledger = Ledger::open_in_memory().unwrap();
        let scenes = vec![Scene::one(&[0.0, 0.1])];
        let (summary, _) = run(3, scenes, &ledger, SessionPolicy::default(), None, &settings());

        assert!(matches!(summary.scope, Scope::Date(_)));
        let records = ledger.attendance_report(&ReportFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id(), None);
    }

    #[test]
    fn test_expired_cooldown_does_not_remark() {
        let ledger = Ledger::open_in_memory().unwrap();
        // Frames are 100 ms apart, so a 50 ms cooldown expires between frames.
        let policy = SessionPolicy::new(Duration::from_millis(50));

        let scenes = vec![Scene::one(&[0.0, 0.0])];
        let (summary, _) = run(5, scenes, &ledger, policy, Some("L1"), &settings());

        assert_eq!(summary.marked.len(), 1);
        assert_eq!(ledger.attendance_report(&ReportFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_processes_every_nth_frame() {
        let ledger = Ledger::open_in_memory().unwrap();
        let settings = LoopSettings { process_every: 3, ..settings() };

        let policy = SessionPolicy::default();
        let (summary, encoder) = run(10, vec![Scene::Empty], &ledger, policy, None, &settings);

        assert_eq!(summary.frames, 10);
        assert_eq!(encoder.detect_calls, 4);
    }

    #[test]
    fn test_max_frames_ends_run() {
        let ledger = Ledger::open_in_memory().unwrap();
        let settings = LoopSettings { max_frames: Some(3), ..settings() };

        let policy = SessionPolicy::default();
        let (summary, encoder) = run(100, vec![Scene::Empty], &ledger, policy, None, &settings);

        assert_eq!(summary.frames, 3);
        assert_eq!(encoder.detect_calls, 3);
    }

    #[test]
    fn test_stop_flag_ends_run_before_reading() {
        let ledger = Ledger::open_in_memory().unwrap();
        let mut camera = FakeCamera::new(10);
        let mut encoder = FakeEncoder::new(vec![Scene::one(&[0.0, 0.0])]);

        let summary = run_recognition(
            &mut camera,
            &mut encoder,
            &ledger,
            &roster(),
            &SessionPolicy::default(),
            RunContext::new(Some("L1".into())),
            &settings(),
            &AtomicBool::new(true),
        )
        .unwrap();

        assert_eq!(summary.frames, 0);
        assert!(summary.marked.is_empty());
    }

    #[test]
    fn test_preview_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("preview.png");
        let ledger = Ledger::open_in_memory().unwrap();
        let settings = LoopSettings { preview: Some(path.clone()), ..settings() };

        let scenes = vec![Scene::one(&[0.0, 0.0])];
        run(2, scenes, &ledger, SessionPolicy::default(), Some("L1"), &settings);

        let preview = image::open(&path).unwrap().to_rgb8();
        assert_eq!(preview.get_pixel(4, 8), &image::Rgb([0, 255, 0]));
    }

    #[test]
    fn test_summary_format() {
        let summary = RunSummary {
            scope: Scope::Session("L001".into()),
            marked: vec![
                MarkedStudent { student_id: "S2".into(), name: "Grace".into() },
                MarkedStudent { student_id: "S1".into(), name: "Ada".into() },
            ],
            frames: 12,
        };
        assert_eq!(
            summary.to_string(),
            "Attendance Summary for Lecture: L001\n\
             Total students marked present: 2\n\
             - Grace (S2)\n\
             - Ada (S1)"
        );
    }
}

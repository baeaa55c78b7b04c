mod config;
#[cfg(test)]
mod fakes;
mod overlay;
mod recognize;
mod register;
mod report;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use config::Config;
use recognize::{LoopSettings, RunSummary};
use register::{CaptureSettings, Enrollment};
use report::ReportQuery;
use rollcall_core::{OnnxFaceEncoder, RosterEntry, RunContext, SessionOutcome, SessionPolicy};
use rollcall_hw::{Camera, FrameStream};
use rollcall_store::{Ledger, ReportFilter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face recognition attendance system")]
struct Cli {
    /// What to do
    #[arg(long, value_enum, default_value_t = Mode::Recognize)]
    mode: Mode,

    /// Student ID (register, report)
    #[arg(long, alias = "student_id")]
    student_id: Option<String>,

    /// Student name (register)
    #[arg(long)]
    name: Option<String>,

    /// Department (register)
    #[arg(long)]
    department: Option<String>,

    /// Capture several face angles instead of one image
    #[arg(long, alias = "multi_capture")]
    multi_capture: bool,

    /// Lecture ID (lecture, recognize, report)
    #[arg(long, alias = "lecture_id")]
    lecture_id: Option<String>,

    /// Course code (lecture)
    #[arg(long)]
    course: Option<String>,

    /// Instructor name (lecture)
    #[arg(long)]
    instructor: Option<String>,

    /// Room (lecture)
    #[arg(long)]
    room: Option<String>,

    /// Only report records of this day (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Stop after reading this many frames
    #[arg(long, alias = "max_frames")]
    max_frames: Option<u64>,

    /// Write the annotated frame to this image file after each processed frame
    #[arg(long)]
    preview: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Enroll a student's face
    Register,
    /// Mark attendance in --lecture-id, or per calendar day when none is
    /// given (no time-based lecture id is generated)
    Recognize,
    /// Create a lecture, take attendance, then close it
    Lecture,
    /// List attendance records
    Report,
}

/// Lecture fields supplied on the command line.
struct LectureArgs {
    lecture_id: String,
    course: String,
    instructor: String,
    room: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Register => {
            let Some(student) = enrollment(&cli) else {
                println!("Error: student_id, name, and department are required for registration");
                println!(
                    "Example: rollcall --mode register --student-id S12345 --name 'John Doe' \
                     --department 'Computer Science'"
                );
                return Ok(());
            };
            let config = Config::load()?;
            let multi = cli.multi_capture;
            let stop = stop_on_ctrl_c();

            let work = move || run_register(&config, &student, multi, &stop);
            let registered = tokio::task::spawn_blocking(work).await??;
            let student_id = cli.student_id.as_deref().unwrap_or_default();
            match (registered, multi) {
                (true, true) => println!(
                    "Successfully registered student {student_id} with multiple face angles"
                ),
                (true, false) => println!("Successfully registered student {student_id}"),
                (false, _) => println!("Failed to register student {student_id}"),
            }
        }
        Mode::Lecture => {
            let Some(lecture) = lecture_args(&cli) else {
                println!(
                    "Error: lecture_id, course, instructor, and room are required \
                     to create a lecture"
                );
                println!(
                    "Example: rollcall --mode lecture --lecture-id L001 --course CS101 \
                     --instructor 'Dr. Smith' --room 'A-101'"
                );
                return Ok(());
            };
            let config = Config::load()?;
            let settings = loop_settings(&config, &cli);
            let stop = stop_on_ctrl_c();

            let work = move || run_lecture(&config, &lecture, &settings, &stop);
            let (summary, ended) = tokio::task::spawn_blocking(work).await??;
            println!("\n{summary}");
            println!("{ended}");
        }
        Mode::Recognize => {
            let config = Config::load()?;
            let settings = loop_settings(&config, &cli);
            let session = cli.lecture_id.clone();
            let stop = stop_on_ctrl_c();

            let work = move || run_recognize(&config, session, &settings, &stop);
            let summary = tokio::task::spawn_blocking(work).await??;
            println!("\n{summary}");
        }
        Mode::Report => {
            let config = Config::load()?;
            let ledger = open_ledger(&config)?;
            let query = match &cli.student_id {
                Some(student_id) => ReportQuery::Student(student_id.clone()),
                None => ReportQuery::Filtered(ReportFilter {
                    date: cli.date,
                    session_id: cli.lecture_id.clone(),
                }),
            };
            println!("{}", report::build_report(&ledger, &query)?);
        }
    }

    Ok(())
}

fn enrollment(cli: &Cli) -> Option<Enrollment> {
    Some(Enrollment {
        student_id: cli.student_id.clone()?,
        name: cli.name.clone()?,
        department: cli.department.clone()?,
    })
}

fn lecture_args(cli: &Cli) -> Option<LectureArgs> {
    Some(LectureArgs {
        lecture_id: cli.lecture_id.clone()?,
        course: cli.course.clone()?,
        instructor: cli.instructor.clone()?,
        room: cli.room.clone()?,
    })
}

fn loop_settings(config: &Config, cli: &Cli) -> LoopSettings {
    LoopSettings {
        threshold: config.match_threshold,
        process_every: config.process_every(),
        max_frames: cli.max_frames,
        preview: cli.preview.clone(),
    }
}

/// Shared flag raised by Ctrl-C; blocking loops poll it once per frame.
fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            flag.store(true, Ordering::Relaxed);
        }
    });
    stop
}

fn open_ledger(config: &Config) -> Result<Ledger> {
    Ledger::open(&config.db_path)
        .with_context(|| format!("failed to open ledger {}", config.db_path.display()))
}

fn load_encoder(config: &Config) -> Result<OnnxFaceEncoder> {
    OnnxFaceEncoder::load(&config.model_dir)
        .with_context(|| format!("failed to load face models from {}", config.model_dir.display()))
}

fn load_roster(ledger: &Ledger) -> Result<Vec<RosterEntry>> {
    let roster: Vec<RosterEntry> = ledger.all_descriptors()?.collect();
    println!("Loaded {} student face encodings", roster.len());
    Ok(roster)
}

/// Open the camera, let exposure settle, and hand the stream to `f`.
fn with_camera<T>(config: &Config, f: impl FnOnce(&mut FrameStream<'_>) -> Result<T>) -> Result<T> {
    let camera = Camera::open(&config.camera_device)
        .with_context(|| format!("failed to open camera {}", config.camera_device))?;
    tracing::info!(
        device = %config.camera_device,
        width = camera.width,
        height = camera.height,
        format = ?camera.pixel_format(),
        "camera ready"
    );
    let mut stream = camera.stream()?;
    stream.discard(config.warmup_frames);
    f(&mut stream)
}

fn run_register(
    config: &Config,
    student: &Enrollment,
    multi: bool,
    stop: &AtomicBool,
) -> Result<bool> {
    let ledger = open_ledger(config)?;
    let mut encoder = load_encoder(config)?;
    let settings = CaptureSettings {
        samples: config.registration_samples,
        interval: config.capture_interval(),
        max_attempts: config.max_capture_attempts,
        image_dir: config.image_dir.clone(),
    };

    with_camera(config, |stream| {
        if multi {
            register::register_multi(stream, &mut encoder, &ledger, student, &settings, stop)
        } else {
            register::register_single(stream, &mut encoder, &ledger, student, &settings, stop)
        }
    })
}

fn run_recognize(
    config: &Config,
    session: Option<String>,
    settings: &LoopSettings,
    stop: &AtomicBool,
) -> Result<RunSummary> {
    let ledger = open_ledger(config)?;
    let roster = load_roster(&ledger)?;
    let mut encoder = load_encoder(config)?;
    let policy = SessionPolicy::new(config.cooldown());

    with_camera(config, |stream| {
        println!("Starting face recognition attendance system...");
        recognize::run_recognition(
            stream,
            &mut encoder,
            &ledger,
            &roster,
            &policy,
            RunContext::new(session),
            settings,
            stop,
        )
    })
}

fn run_lecture(
    config: &Config,
    lecture: &LectureArgs,
    settings: &LoopSettings,
    stop: &AtomicBool,
) -> Result<(RunSummary, SessionOutcome)> {
    let ledger = open_ledger(config)?;
    let roster = load_roster(&ledger)?;
    let mut encoder = load_encoder(config)?;
    let policy = SessionPolicy::new(config.cooldown());

    with_camera(config, |stream| {
        let created = ledger.create_session(
            &lecture.lecture_id,
            &lecture.course,
            &lecture.instructor,
            &lecture.room,
        )?;
        println!("{created}");

        let ctx = RunContext::new(Some(lecture.lecture_id.clone()));
        let summary = recognize::run_recognition(
            stream,
            &mut encoder,
            &ledger,
            &roster,
            &policy,
            ctx,
            settings,
            stop,
        );

        let ended = ledger.end_session(&lecture.lecture_id)?;
        tracing::info!(kind = ?ended.kind(), "lecture closed");
        Ok((summary?, ended))
    })
}

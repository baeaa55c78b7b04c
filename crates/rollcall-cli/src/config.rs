use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Camera frames per second assumed when converting the recognition interval to a frame stride.
const ASSUMED_FPS: f32 = 30.0;

/// Runtime configuration: defaults, then an optional TOML file, then `ROLLCALL_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing `det_10g.onnx` and `w600k_r50.onnx`.
    pub model_dir: PathBuf,
    /// Path to the SQLite attendance ledger.
    pub db_path: PathBuf,
    /// Folder for registration face crops.
    pub image_dir: PathBuf,
    /// Maximum descriptor distance for a positive identification.
    pub match_threshold: f32,
    /// Seconds before the same student may trigger another mark attempt.
    pub cooldown_secs: u64,
    /// Seconds between processed frames during recognition.
    pub recognition_interval: f32,
    /// Descriptors collected by a multi-capture registration.
    pub registration_samples: usize,
    /// Seconds between multi-capture samples.
    pub capture_interval: f32,
    /// Frames a registration reads before giving up.
    pub max_capture_attempts: usize,
    /// Frames discarded after opening the camera.
    pub warmup_frames: usize,
}

/// Optional overrides read from `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    camera_device: Option<String>,
    model_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    image_dir: Option<PathBuf>,
    match_threshold: Option<f32>,
    cooldown_secs: Option<u64>,
    recognition_interval: Option<f32>,
    registration_samples: Option<usize>,
    capture_interval: Option<f32>,
    max_capture_attempts: Option<usize>,
    warmup_frames: Option<usize>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = data_dir(&lookup);

        let config_path = lookup("ROLLCALL_CONFIG")
            .map(PathBuf::from)
            .or_else(|| Some(data_dir.join("config.toml")).filter(|p| p.exists()));
        let file = match config_path {
            Some(path) => read_file_config(&path)?,
            None => FileConfig::default(),
        };

        let env_path = |key: &str| lookup(key).map(PathBuf::from);
        let env_parse = |key: &str| lookup(key).and_then(|v| v.parse::<f64>().ok());

        let config = Self {
            camera_device: lookup("ROLLCALL_CAMERA_DEVICE")
                .or(file.camera_device)
                .unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir: env_path("ROLLCALL_MODEL_DIR")
                .or(file.model_dir)
                .unwrap_or_else(|| data_dir.join("models")),
            db_path: env_path("ROLLCALL_DB_PATH")
                .or(file.db_path)
                .unwrap_or_else(|| data_dir.join("attendance.db")),
            image_dir: env_path("ROLLCALL_IMAGE_DIR")
                .or(file.image_dir)
                .unwrap_or_else(|| data_dir.join("student_images")),
            match_threshold: env_parse("ROLLCALL_MATCH_THRESHOLD")
                .map(|v| v as f32)
                .or(file.match_threshold)
                .unwrap_or(rollcall_core::DEFAULT_MATCH_THRESHOLD),
            cooldown_secs: env_parse("ROLLCALL_COOLDOWN_SECS")
                .map(|v| v as u64)
                .or(file.cooldown_secs)
                .unwrap_or(rollcall_core::DEFAULT_COOLDOWN.as_secs()),
            recognition_interval: env_parse("ROLLCALL_RECOGNITION_INTERVAL")
                .map(|v| v as f32)
                .or(file.recognition_interval)
                .unwrap_or(1.0),
            registration_samples: env_parse("ROLLCALL_REGISTRATION_SAMPLES")
                .map(|v| v as usize)
                .or(file.registration_samples)
                .unwrap_or(20),
            capture_interval: env_parse("ROLLCALL_CAPTURE_INTERVAL")
                .map(|v| v as f32)
                .or(file.capture_interval)
                .unwrap_or(1.0),
            max_capture_attempts: env_parse("ROLLCALL_MAX_CAPTURE_ATTEMPTS")
                .map(|v| v as usize)
                .or(file.max_capture_attempts)
                .unwrap_or(300),
            warmup_frames: env_parse("ROLLCALL_WARMUP_FRAMES")
                .map(|v| v as usize)
                .or(file.warmup_frames)
                .unwrap_or(4),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.match_threshold.is_finite() || self.match_threshold < 0.0 {
            bail!("match_threshold must be a non-negative number, got {}", self.match_threshold);
        }
        if !self.recognition_interval.is_finite() || self.recognition_interval < 0.0 {
            bail!(
                "recognition_interval must be a non-negative number of seconds, got {}",
                self.recognition_interval
            );
        }
        Duration::try_from_secs_f32(self.capture_interval).with_context(|| {
            format!(
                "capture_interval must be a non-negative number of seconds, got {}",
                self.capture_interval
            )
        })?;
        Ok(())
    }

    /// Every n-th camera frame goes through detection and matching.
    pub fn process_every(&self) -> usize {
        ((self.recognition_interval * ASSUMED_FPS).round() as usize).max(1)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::try_from_secs_f32(self.capture_interval).unwrap_or_default()
    }
}

/// `$ROLLCALL_DATA_DIR`, else `$XDG_DATA_HOME/rollcall`, else `~/.local/share/rollcall`.
fn data_dir(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = lookup("ROLLCALL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    lookup("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
}

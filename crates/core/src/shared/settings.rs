use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::*;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Tuning and capture parameters for the detection loop.
///
/// Every field has a default so partial JSON files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tolerance: f64,
    pub frame_skip: usize,
    pub dwell_secs: f64,
    pub cooldown_secs: f64,
    pub max_association_distance: f64,
    pub gc_interval_cycles: usize,
    pub min_attendance_confidence: f64,
    pub max_faces: usize,
    pub face_confidence: f64,
    pub capture: CaptureSettings,
    /// Palm detector ONNX model; downloaded to the model cache when unset.
    pub palm_model: Option<PathBuf>,
    /// Hand landmark ONNX model; downloaded to the model cache when unset.
    pub hand_model: Option<PathBuf>,
    pub max_hands: usize,
}

/// Capture device and the resolution/rate requested from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Device node, file path or URL handed to the frame source.
    pub device: String,
    /// Demuxer name for capture devices (`v4l2`, `avfoundation`, `dshow`).
    pub input_format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device: default_device().to_string(),
            input_format: default_input_format().map(str::to_string),
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            fps: DEFAULT_CAPTURE_FPS,
        }
    }
}

fn default_device() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "0"
    }
    #[cfg(target_os = "windows")]
    {
        "video=Integrated Camera"
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        "/dev/video0"
    }
}

fn default_input_format() -> Option<&'static str> {
    #[cfg(target_os = "macos")]
    {
        Some("avfoundation")
    }
    #[cfg(target_os = "windows")]
    {
        Some("dshow")
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Some("v4l2")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            frame_skip: DEFAULT_FRAME_SKIP,
            dwell_secs: DEFAULT_DWELL_SECS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            max_association_distance: DEFAULT_MAX_ASSOCIATION_DISTANCE,
            gc_interval_cycles: DEFAULT_GC_INTERVAL_CYCLES,
            min_attendance_confidence: DEFAULT_MIN_ATTENDANCE_CONFIDENCE,
            max_faces: DEFAULT_MAX_FACES,
            face_confidence: 0.5,
            capture: CaptureSettings::default(),
            palm_model: None,
            hand_model: None,
            max_hands: DEFAULT_MAX_HANDS,
        }
    }
}

impl Settings {
    /// `<config dir>/AttendCam/settings.json`.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads settings from the platform config directory, falling back to
    /// defaults when no file exists there.
    pub fn load() -> Result<Self, SettingsError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Settings = serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |e| SettingsError::Write {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(name: &'static str, reason: String) -> Result<(), SettingsError> {
            Err(SettingsError::Invalid { name, reason })
        }

        if self.frame_skip < 1 {
            return invalid("frame_skip", "must be >= 1".into());
        }
        if !(self.tolerance > 0.0) {
            return invalid("tolerance", format!("must be positive, got {}", self.tolerance));
        }
        if !is_duration_secs(self.dwell_secs) {
            return invalid(
                "dwell_secs",
                format!("must be between 0 and {MAX_DURATION_SECS}, got {}", self.dwell_secs),
            );
        }
        if !is_duration_secs(self.cooldown_secs) {
            return invalid(
                "cooldown_secs",
                format!("must be between 0 and {MAX_DURATION_SECS}, got {}", self.cooldown_secs),
            );
        }
        if !(self.max_association_distance > 0.0) {
            return invalid(
                "max_association_distance",
                format!("must be positive, got {}", self.max_association_distance),
            );
        }
        if self.gc_interval_cycles < 1 {
            return invalid("gc_interval_cycles", "must be >= 1".into());
        }
        if !(0.0..=1.0).contains(&self.face_confidence) {
            return invalid(
                "face_confidence",
                format!("must be between 0.0 and 1.0, got {}", self.face_confidence),
            );
        }
        if self.max_hands < 1 {
            return invalid("max_hands", "must be >= 1".into());
        }
        if self.capture.width == 0 || self.capture.height == 0 || self.capture.fps == 0 {
            return invalid("capture", "width, height and fps must be non-zero".into());
        }
        Ok(())
    }

    /// Only meaningful after [`Settings::validate`] succeeded.
    pub fn dwell(&self) -> Duration {
        Duration::from_secs_f64(self.dwell_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }
}

/// Finite, non-negative and small enough for both `std` and `chrono` durations.
fn is_duration_secs(secs: f64) -> bool {
    (0.0..=MAX_DURATION_SECS).contains(&secs) && Duration::try_from_secs_f64(secs).is_ok()
}

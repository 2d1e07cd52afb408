//! Configuration file handling.
//!
//! Loads pipeline tunables from a TOML file. A missing file yields defaults;
//! a file that exists but cannot be parsed is an error.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{PixelFormat, Resolution};

/// Configuration file structure.
///
/// ```toml
/// [capture]
/// read_timeout_ms = 100
/// stop_timeout_ms = 2000
/// read_retries = 3
///
/// [preview]
/// width = 1280
/// height = 720
/// format = "RGBX"
/// ```
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// Capture-loop timing and retry tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// How long one blocking chunk read may wait before the loop rechecks
    /// its stop flag, in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Upper bound on `stop()` waiting for the capture thread to quiesce,
    /// in milliseconds
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Consecutive transient read failures after which the device is
    /// declared lost
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            read_retries: default_read_retries(),
        }
    }
}

impl CaptureConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Default preview layout, matching the original interface's initial values.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Requested output format name: RGBX, RGB565, RAW, YUV, YUV420SP, NV21
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            format: default_format(),
        }
    }
}

impl PreviewConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Parse the configured format name.
    ///
    /// Returns `None` for an unrecognized name; callers decide whether to
    /// fall back or reject.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        match self.format.to_ascii_uppercase().as_str() {
            "RGBX" => Some(PixelFormat::Rgbx),
            "RGB565" => Some(PixelFormat::Rgb565),
            "RAW" => Some(PixelFormat::Raw),
            "YUV" => Some(PixelFormat::Yuv),
            "YUV420SP" => Some(PixelFormat::Yuv420sp),
            "NV21" => Some(PixelFormat::Nv21),
            _ => None,
        }
    }
}

fn default_read_timeout_ms() -> u64 {
    100
}

fn default_stop_timeout_ms() -> u64 {
    2000
}

fn default_read_retries() -> u32 {
    3
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_format() -> String {
    "RGBX".to_string()
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

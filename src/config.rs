//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::state::Timings;

const DEFAULT_SIGNAL_URL: &str = "ws://localhost:6789";
const DEFAULT_MIC_DEVICE: &str = "/dev/snd";
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Presence-detection websocket feed
    pub signal_url: String,

    /// Base URL of the credential endpoints
    pub api_base_url: String,

    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Where the latest rendered frame is written
    pub frame_path: PathBuf,

    /// Capture device whose presence grants microphone access
    pub mic_device: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    pub session_debounce: Duration,
    pub congrats_display: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    ///
    /// A `.env` file in the working directory is read first if present;
    /// variables already set in the environment win.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    fn from_env() -> Result<Self, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::MissingVar("HOME"))?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("presence-kiosk");

        let signal_url = var_or("KIOSK_SIGNAL_URL", DEFAULT_SIGNAL_URL);
        let api_base_url = var_or("KIOSK_API_BASE_URL", DEFAULT_API_BASE_URL);
        if reqwest::Url::parse(&api_base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                var: "KIOSK_API_BASE_URL",
                value: api_base_url,
            });
        }
        let socket_path = optional("KIOSK_SOCKET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("kiosk.sock"));
        let frame_path = optional("KIOSK_FRAME_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("frame.jpg"));
        let mic_device = PathBuf::from(var_or("KIOSK_MIC_DEVICE", DEFAULT_MIC_DEVICE));

        let defaults = Timings::default();
        let session_debounce = millis("KIOSK_SESSION_DEBOUNCE_MS", defaults.session_debounce)?;
        let congrats_display = millis("KIOSK_CONGRATS_MS", defaults.congrats_display)?;

        Ok(Self {
            signal_url,
            api_base_url,
            socket_path,
            frame_path,
            mic_device,
            data_dir,
            session_debounce,
            congrats_display,
        })
    }

    pub fn timings(&self) -> Timings {
        Timings {
            session_debounce: self.session_debounce,
            congrats_display: self.congrats_display,
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

/// Unset and empty are treated alike
fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(var: &str, default: &str) -> String {
    optional(var).unwrap_or_else(|| default.to_string())
}

fn millis(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match optional(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

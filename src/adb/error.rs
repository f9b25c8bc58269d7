use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for ADB operations.
pub type AdbResult<T> = Result<T, AdbError>;

/// The error type for all ADB-related operations.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error("'{path:?}' not found. Install Android Platform Tools or set adb_path in config.jsonc")]
    AdbNotFound { path: PathBuf },

    #[error("Failed to run '{command}': {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Operation timed out after {duration:?}: {description}")]
    Timeout {
        duration: std::time::Duration,
        description: String,
    },

    #[error("No device attached and none of {tried:?} accepted a connection")]
    NoDevice { tried: Vec<String> },

    #[error("Device '{serial}' not found after adb connect")]
    DeviceNotFound { serial: String },

    #[error("Screen capture returned no data")]
    EmptyCapture,

    #[error("Failed to decode screen capture: {source}")]
    DecodeFailed {
        #[from]
        source: image::ImageError,
    },
}

impl AdbError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdbError::CommandFailed { .. }
                | AdbError::Timeout { .. }
                | AdbError::EmptyCapture
                | AdbError::DecodeFailed { .. }
        )
    }
}

//! # Error Types
//!
//! Custom error types for the capture pipeline using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ringosc-capture
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The serial transport could not be opened
    #[error("Failed to connect to {port}: {source}")]
    TransportConnect {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// A frame read failed at the transport level
    #[error("Frame read error: {0}")]
    FrameRead(#[source] std::io::Error),

    /// A log file could not be created, opened or written
    #[error("Log file error on {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A completed log file could not be published
    #[error("Failed to publish {}: {reason}", path.display())]
    Publish { path: PathBuf, reason: String },

    /// A log line could not be parsed back into a record
    #[error("Malformed log record: {0}")]
    Record(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether this error ends the capture loop
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CaptureError::FrameRead(_) | CaptureError::Record(_))
    }
}

/// Result type alias for ringosc-capture
pub type Result<T> = std::result::Result<T, CaptureError>;

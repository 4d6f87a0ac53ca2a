//! Error types for radio-server
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Bitrate probe failures have their own type (`probe::ProbeError`) because
//! they never leave the probe.

use thiserror::Error;

/// Main error type for radio-server
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Playback session errors
    #[error("Session error: {0}")]
    Session(String),

    /// A later command arrived while a start was still probing
    #[error("Superseded by a later command")]
    Superseded,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Convenience Result type using radio-server Error
pub type Result<T> = std::result::Result<T, Error>;

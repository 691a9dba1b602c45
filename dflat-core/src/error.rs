//! Error types for the dflat file server.

use thiserror::Error;

use crate::lines::Line;

/// Errors that can occur while serving the host.
#[derive(Error, Debug)]
pub enum DflatError {
    #[error("Host deselected the file server")]
    SelectionLost,

    #[error("Unknown command byte: {0:#04X}")]
    UnknownCommand(u8),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Cannot open {path}: {reason}")]
    OpenFailure { path: String, reason: String },

    #[error("Filename longer than {capacity} bytes")]
    BufferOverrun { capacity: usize },

    #[error("Clock stalled waiting on {line:?}")]
    ClockStalled { line: Line },

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Invalid handle")]
    InvalidHandle,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DflatError {
    /// Whether the host should be told about this error with a busy-hold.
    ///
    /// Selection loss needs no signal, the host already walked away.
    pub fn wants_busy_hold(&self) -> bool {
        !matches!(self, DflatError::SelectionLost)
    }
}

/// Result type for dflat operations.
pub type DflatResult<T> = Result<T, DflatError>;

//! Error types for otree-db-log

use thiserror::Error;

use crate::record::Commit;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, LogError>;

/// Errors from transaction log operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// Another writer committed the version this writer read against.
    ///
    /// Carries every commit that landed since `read_version` so the caller
    /// can decide whether a rebase is possible.
    #[error("Commit conflict: read version {read_version}, log is at {actual_version}")]
    Conflict {
        read_version: u64,
        actual_version: u64,
        winners: Vec<Commit>,
    },

    /// Log storage I/O error
    #[error("Log I/O error: {0}")]
    Io(String),

    /// Malformed commit content
    #[error("Corrupt log entry: {0}")]
    Corrupt(String),

    /// Log not found at the given location
    #[error("Log not found: {0}")]
    NotFound(String),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LogError {
    pub fn io(msg: impl Into<String>) -> Self {
        LogError::Io(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        LogError::Corrupt(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        LogError::NotFound(msg.into())
    }

    /// Whether this error is a commit conflict (retryable by rebase).
    pub fn is_conflict(&self) -> bool {
        matches!(self, LogError::Conflict { .. })
    }
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        LogError::Io(err.to_string())
    }
}

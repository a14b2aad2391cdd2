//! Error types for otree-db-write

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, WriteError>;

/// Errors from the write pipeline.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Block writer I/O error: the partition is aborted
    #[error("Writer I/O error: {0}")]
    WriterIo(String),

    /// Conflicts persisted through every rebase attempt
    #[error("Commit conflict after {attempts} attempts")]
    CommitConflict { attempts: usize },

    /// The winning commit changed metadata or removed files; rebase is unsafe
    #[error("Concurrent commit is not append-only; write cannot be rebased")]
    ConflictNotRebasable,

    /// Malformed block content on read-back
    #[error("Corrupt block {path}: {reason}")]
    CorruptBlock { path: String, reason: String },

    /// Core data-model error
    #[error(transparent)]
    Core(#[from] otree_db_core::CoreError),

    /// Indexing error
    #[error(transparent)]
    Index(#[from] otree_db_index::IndexError),

    /// Transaction log error
    #[error(transparent)]
    Log(#[from] otree_db_log::LogError),
}

impl WriteError {
    pub fn writer_io(msg: impl Into<String>) -> Self {
        WriteError::WriterIo(msg.into())
    }

    pub fn corrupt_block(path: impl Into<String>, reason: impl Into<String>) -> Self {
        WriteError::CorruptBlock {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for WriteError {
    fn from(err: std::io::Error) -> Self {
        WriteError::WriterIo(err.to_string())
    }
}

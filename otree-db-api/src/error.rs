//! Error types for otree-db-api

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by the table facade.
#[derive(Debug, Error)]
pub enum ApiError {
    /// First write without `columnsToIndex`
    #[error("columnsToIndex is required on the first write to a table")]
    ColumnsRequired,

    /// Write options name different indexed columns than the table has
    #[error("columnsToIndex mismatch: table indexes {existing:?}, write asked for {requested:?}")]
    ColumnsMismatch {
        existing: Vec<String>,
        requested: Vec<String>,
    },

    /// Unparseable write option value
    #[error("Invalid write option {key}: {reason}")]
    InvalidOption { key: String, reason: String },

    /// Core data-model error
    #[error(transparent)]
    Core(#[from] otree_db_core::CoreError),

    /// Transaction log error
    #[error(transparent)]
    Log(#[from] otree_db_log::LogError),

    /// Indexing error
    #[error(transparent)]
    Index(#[from] otree_db_index::IndexError),

    /// Write pipeline error
    #[error(transparent)]
    Write(#[from] otree_db_write::WriteError),

    /// Scan planning error
    #[error(transparent)]
    Query(#[from] otree_db_query::QueryError),
}

impl ApiError {
    pub fn invalid_option(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::InvalidOption {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

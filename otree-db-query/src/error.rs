//! Error types for otree-db-query

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors from scan planning.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The table has no committed metadata yet
    #[error("Table not initialized: {0}")]
    NotInitialized(String),

    /// The revision a query was planned against no longer resolves;
    /// the caller must reload the snapshot and re-plan
    #[error("Revision mismatch: {0}")]
    RevisionMismatch(String),

    /// Core data-model error
    #[error(transparent)]
    Core(#[from] otree_db_core::CoreError),

    /// Transaction log error
    #[error(transparent)]
    Log(#[from] otree_db_log::LogError),
}

impl QueryError {
    pub fn not_initialized(msg: impl Into<String>) -> Self {
        QueryError::NotInitialized(msg.into())
    }

    pub fn revision_mismatch(msg: impl Into<String>) -> Self {
        QueryError::RevisionMismatch(msg.into())
    }
}

//! Error types for otree-db-index

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors from indexing operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Core data-model error (missing column, schema mismatch)
    #[error(transparent)]
    Core(#[from] otree_db_core::CoreError),

    /// Batch dimensionality does not match the revision
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Optimize asked for a cube the index state does not contain
    #[error("Unknown cube: {0}")]
    UnknownCube(String),
}

impl IndexError {
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        IndexError::DimensionMismatch(msg.into())
    }

    pub fn unknown_cube(msg: impl Into<String>) -> Self {
        IndexError::UnknownCube(msg.into())
    }
}

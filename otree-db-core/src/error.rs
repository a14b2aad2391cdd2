//! Error types for otree-db-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// A required indexed column is absent from the batch schema
    #[error("Missing indexed column: {0}")]
    MissingIndexedColumn(String),

    /// A value could not be projected into the normalized space
    #[error("Transform domain error: {0}")]
    TransformDomain(String),

    /// Malformed cube identifier bytes or string
    #[error("Invalid cube id: {0}")]
    InvalidCubeId(String),

    /// Revision referenced by a query or block no longer exists
    #[error("Revision mismatch: {0}")]
    RevisionMismatch(String),

    /// Schema-level problem (type mismatch, duplicate column, ragged batch)
    #[error("Schema error: {0}")]
    Schema(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create a missing-indexed-column error
    pub fn missing_column(name: impl Into<String>) -> Self {
        CoreError::MissingIndexedColumn(name.into())
    }

    /// Create a transform domain error
    pub fn transform_domain(msg: impl Into<String>) -> Self {
        CoreError::TransformDomain(msg.into())
    }

    /// Create an invalid cube id error
    pub fn invalid_cube_id(msg: impl Into<String>) -> Self {
        CoreError::InvalidCubeId(msg.into())
    }

    /// Create a revision mismatch error
    pub fn revision_mismatch(msg: impl Into<String>) -> Self {
        CoreError::RevisionMismatch(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        CoreError::Schema(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        CoreError::Other(msg.into())
    }
}

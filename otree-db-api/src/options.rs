//! Write options.
//!
//! The options a host recognizes on a write call, either built directly or
//! parsed from a string map (`columnsToIndex`, `cubeSize`,
//! `stagingSizeInBytes`).

use std::collections::HashMap;

use crate::error::{ApiError, Result};

/// Option key for the comma-separated indexed column list.
pub const COLUMNS_TO_INDEX: &str = "columnsToIndex";
/// Option key for the desired per-cube element count.
pub const CUBE_SIZE: &str = "cubeSize";
/// Option key for the staging-area byte threshold.
pub const STAGING_SIZE_IN_BYTES: &str = "stagingSizeInBytes";

/// Options recognized on a write call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    /// Indexed column names. Required on the first write; later writes may
    /// omit it (and must match if present).
    pub columns_to_index: Option<Vec<String>>,
    /// Desired per-cube element count; falls back to the engine default.
    pub cube_size: Option<usize>,
    /// Staging-area threshold; unset disables staging.
    pub staging_size_in_bytes: Option<u64>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indexed columns from a comma-separated list.
    pub fn with_columns_to_index(mut self, columns: &str) -> Self {
        self.columns_to_index = Some(split_columns(columns));
        self
    }

    pub fn with_cube_size(mut self, cube_size: usize) -> Self {
        self.cube_size = Some(cube_size);
        self
    }

    pub fn with_staging_size_in_bytes(mut self, bytes: u64) -> Self {
        self.staging_size_in_bytes = Some(bytes);
        self
    }

    /// Parse options from a string map, rejecting malformed values.
    /// Unrecognized keys are ignored (hosts pass through their own options).
    pub fn parse(options: &HashMap<String, String>) -> Result<Self> {
        let mut parsed = Self::new();
        if let Some(columns) = options.get(COLUMNS_TO_INDEX) {
            let columns = split_columns(columns);
            if columns.is_empty() {
                return Err(ApiError::invalid_option(
                    COLUMNS_TO_INDEX,
                    "empty column list",
                ));
            }
            parsed.columns_to_index = Some(columns);
        }
        if let Some(raw) = options.get(CUBE_SIZE) {
            let cube_size: usize = raw
                .parse()
                .map_err(|_| ApiError::invalid_option(CUBE_SIZE, format!("not a number: {raw}")))?;
            if cube_size == 0 {
                return Err(ApiError::invalid_option(CUBE_SIZE, "must be positive"));
            }
            parsed.cube_size = Some(cube_size);
        }
        if let Some(raw) = options.get(STAGING_SIZE_IN_BYTES) {
            let bytes: u64 = raw.parse().map_err(|_| {
                ApiError::invalid_option(STAGING_SIZE_IN_BYTES, format!("not a number: {raw}"))
            })?;
            parsed.staging_size_in_bytes = Some(bytes);
        }
        Ok(parsed)
    }
}

fn split_columns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

//! Engine configuration
//!
//! Process-scope knobs for the write pipeline and the optimizer. These are
//! defaults only: whatever a write actually uses is captured into its
//! Revision at commit time, and the read path never consults this struct.

use crate::weight::DEFAULT_WEIGHT_SEED;

/// Default desired per-cube element count.
pub const DEFAULT_CUBE_SIZE: usize = 5_000_000;

/// Default bound on the number of weights buffered per cube while estimating
/// cutoffs.
pub const DEFAULT_CUBE_WEIGHTS_BUFFER_CAPACITY: usize = 100_000;

/// Default number of commit retries after a conflict.
pub const DEFAULT_NUMBER_OF_RETRIES: usize = 2;

/// Default compaction file-size window (bytes).
pub const DEFAULT_MIN_COMPACTION_FILE_SIZE: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_MAX_COMPACTION_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Configuration for the indexing engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Desired per-cube element count when a write does not specify one.
    pub default_cube_size: usize,

    /// Upper bound on per-cube weight buffering during cutoff estimation.
    ///
    /// Caps the worst-case memory of one indexing pass; cutoffs computed
    /// from a saturated buffer are estimates over the buffered sample.
    pub cube_weights_buffer_capacity: usize,

    /// How many times a conflicted commit is rebased and retried before the
    /// failure surfaces to the caller.
    pub number_of_retries: usize,

    /// Files below this size are candidates for compaction grouping.
    pub min_compaction_file_size_in_bytes: u64,

    /// Compaction never produces files above this size.
    pub max_compaction_file_size_in_bytes: u64,

    /// Deployment-wide weight hash seed. Must match across every process
    /// that writes to or plans scans over the same tables.
    pub weight_seed: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_cube_size: DEFAULT_CUBE_SIZE,
            cube_weights_buffer_capacity: DEFAULT_CUBE_WEIGHTS_BUFFER_CAPACITY,
            number_of_retries: DEFAULT_NUMBER_OF_RETRIES,
            min_compaction_file_size_in_bytes: DEFAULT_MIN_COMPACTION_FILE_SIZE,
            max_compaction_file_size_in_bytes: DEFAULT_MAX_COMPACTION_FILE_SIZE,
            weight_seed: DEFAULT_WEIGHT_SEED,
        }
    }
}

impl EngineConfig {
    /// Builder method to set the default cube size
    pub fn with_default_cube_size(mut self, size: usize) -> Self {
        self.default_cube_size = size;
        self
    }

    /// Builder method to set the cube weights buffer capacity
    pub fn with_cube_weights_buffer_capacity(mut self, capacity: usize) -> Self {
        self.cube_weights_buffer_capacity = capacity;
        self
    }

    /// Builder method to set the number of commit retries
    pub fn with_number_of_retries(mut self, retries: usize) -> Self {
        self.number_of_retries = retries;
        self
    }

    /// Builder method to set the compaction file-size window
    pub fn with_compaction_file_sizes(mut self, min_bytes: u64, max_bytes: u64) -> Self {
        self.min_compaction_file_size_in_bytes = min_bytes;
        self.max_compaction_file_size_in_bytes = max_bytes;
        self
    }

    /// Builder method to set the weight hash seed
    pub fn with_weight_seed(mut self, seed: u32) -> Self {
        self.weight_seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.default_cube_size, 5_000_000);
        assert_eq!(config.cube_weights_buffer_capacity, 100_000);
        assert_eq!(config.number_of_retries, 2);
        assert_eq!(config.weight_seed, DEFAULT_WEIGHT_SEED);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_default_cube_size(300_000)
            .with_number_of_retries(5)
            .with_weight_seed(7);
        assert_eq!(config.default_cube_size, 300_000);
        assert_eq!(config.number_of_retries, 5);
        assert_eq!(config.weight_seed, 7);
    }
}

//! Block tags: the per-file metadata that makes the index reconstructible
//! from the transaction log alone.
//!
//! A block is one immutable output file holding the rows of one cube from
//! one write. Its tags travel on the log's AddFile record; the in-memory
//! index state is a pure reduction of the tags of all live blocks.

use serde::{Deserialize, Serialize};

use crate::cube::CubeId;
use crate::weight::{Weight, MAX_WEIGHT};

/// Lifecycle state of a cube's blocks.
///
/// Ordering is by lifecycle progression; folding multiple blocks of one cube
/// takes the furthest state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CubeState {
    /// Normal state of a written block. The cube may carry a finite weight
    /// cutoff once filled to capacity.
    Flooded,
    /// An optimization proposal covering this cube has been announced.
    /// Advisory only: reads treat announced blocks exactly like flooded ones.
    Announced,
    /// The cube's rows are represented by descendants; the block is
    /// logically obsolete and awaits removal.
    Replicated,
}

impl Default for CubeState {
    fn default() -> Self {
        CubeState::Flooded
    }
}

/// Tags carried by every block on its AddFile record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockTags {
    /// The cube this block belongs to.
    pub cube: CubeId,
    /// Smallest weight among the block's rows.
    pub min_weight: Weight,
    /// The cube's weight cutoff at write time; `MAX_WEIGHT` when the cube
    /// was still open. Every row in the block has a weight strictly below
    /// this (or equal to `MAX_WEIGHT` itself on open cubes).
    pub max_weight: Weight,
    /// Lifecycle state.
    pub state: CubeState,
    /// Revision that produced this block.
    pub revision_id: u64,
    /// Number of rows in the block.
    pub element_count: u64,
}

impl BlockTags {
    /// Whether the cube had no weight cutoff when this block was written.
    pub fn is_open(&self) -> bool {
        self.max_weight == MAX_WEIGHT
    }

    /// The block's weight interval as a closed `[min, max]` pair on the
    /// widened i64 axis, for pruning against half-open query ranges.
    pub fn weight_interval(&self) -> (i64, i64) {
        (self.min_weight.as_i64(), self.max_weight.as_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::MIN_WEIGHT;

    #[test]
    fn test_state_ordering_is_lifecycle() {
        assert!(CubeState::Flooded < CubeState::Announced);
        assert!(CubeState::Announced < CubeState::Replicated);
    }

    #[test]
    fn test_tags_round_trip() {
        let tags = BlockTags {
            cube: CubeId::root(2).child(3),
            min_weight: MIN_WEIGHT,
            max_weight: Weight(12345),
            state: CubeState::Flooded,
            revision_id: 1,
            element_count: 42,
        };
        let json = serde_json::to_string(&tags).unwrap();
        let back: BlockTags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tags);
        assert!(!tags.is_open());
    }

    #[test]
    fn test_open_block() {
        let tags = BlockTags {
            cube: CubeId::root(1),
            min_weight: Weight(-10),
            max_weight: MAX_WEIGHT,
            state: CubeState::default(),
            revision_id: 1,
            element_count: 1,
        };
        assert!(tags.is_open());
        assert_eq!(tags.weight_interval(), (-10, i32::MAX as i64));
    }
}

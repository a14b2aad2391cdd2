//! Staging: accumulate small appends without paying for indexing.
//!
//! With `stagingSizeInBytes` set, small batches are committed as unindexed
//! staging blocks - single root-cube files tagged with the staging revision.
//! Once the staged bytes would exceed the threshold, the write pipeline
//! reads the staged rows back and indexes them together with the incoming
//! batch as one large batch, retiring the staging files in the same commit.

use otree_db_core::revision::STAGING_REVISION_ID;
use otree_db_core::{weight_of, ColumnBatch, CubeId, CubeState, Revision, MAX_WEIGHT};
use otree_db_index::CubeGroup;
use otree_db_log::LogSnapshot;

use crate::error::Result;

/// Whether and when writes stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagingPolicy {
    /// Staging-area byte threshold; `None` disables staging entirely.
    pub staging_size_in_bytes: Option<u64>,
}

impl StagingPolicy {
    pub fn disabled() -> Self {
        Self {
            staging_size_in_bytes: None,
        }
    }

    pub fn with_threshold(bytes: u64) -> Self {
        Self {
            staging_size_in_bytes: Some(bytes),
        }
    }

    /// Decide whether an incoming batch should stage rather than index,
    /// given the bytes already staged.
    pub fn should_stage(&self, staged_bytes: u64, incoming_bytes: u64) -> bool {
        match self.staging_size_in_bytes {
            None => false,
            Some(threshold) => staged_bytes + incoming_bytes <= threshold,
        }
    }
}

/// Total bytes currently staged in a snapshot.
pub fn staged_bytes(snapshot: &LogSnapshot) -> u64 {
    snapshot
        .files_for_revision(STAGING_REVISION_ID)
        .iter()
        .map(|f| f.size)
        .sum()
}

/// Paths of the staging files in a snapshot.
pub fn staged_paths(snapshot: &LogSnapshot) -> Vec<String> {
    snapshot
        .files_for_revision(STAGING_REVISION_ID)
        .iter()
        .map(|f| f.path.clone())
        .collect()
}

/// Build the single root-cube group a staged batch is written as.
///
/// Weights are computed (the block's min-weight tag must be truthful for
/// file skipping) but no descent or capacity logic runs.
pub fn staging_group(
    batch: &ColumnBatch,
    revision: &Revision,
    seed: u32,
) -> Result<CubeGroup> {
    let columns = batch.schema().project(&revision.columns)?;
    let min_weight = (0..batch.num_rows())
        .map(|i| weight_of(&batch.values_at(i, &columns), seed))
        .min()
        .unwrap_or(MAX_WEIGHT);
    Ok(CubeGroup {
        cube: CubeId::root(revision.dims()),
        rows: (0..batch.num_rows()).collect(),
        min_weight,
        max_weight: MAX_WEIGHT,
        state: CubeState::Flooded,
    })
}

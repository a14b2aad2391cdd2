//! Scan planning with weight-range file skipping.
//!
//! The planner takes a log snapshot, binds the query to a revision, and
//! lists the files a scan must read. With a sample pushdown attached it
//! drops every file whose `[min-weight, max-weight]` tag is disjoint from
//! the requested interval and reports the residual row filter the executor
//! must still apply to surviving files.

use otree_db_core::revision::STAGING_REVISION_ID;
use otree_db_core::{ColumnBatch, Weight, weight_of};
use otree_db_log::{AddFile, LogSnapshot};

use crate::error::{QueryError, Result};
use crate::pushdown::WeightRange;
use crate::rewrite::SamplePushdown;

/// One file a scan must read.
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub file: AddFile,
}

/// A planned scan.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    /// Revision the plan was bound to.
    pub revision_id: u64,
    /// Indexed column names, for residual evaluation.
    pub indexed_columns: Vec<String>,
    /// Files to read, in path order.
    pub tasks: Vec<ScanTask>,
    /// Row filter surviving files still need, if any.
    pub residual: Option<WeightRange>,
    /// Files dropped by tag pruning.
    pub skipped_files: usize,
}

impl ScanPlan {
    /// Total tagged rows across the files to be read (pre-residual).
    pub fn tagged_elements(&self) -> u64 {
        self.tasks.iter().map(|t| t.file.tags.element_count).sum()
    }
}

/// Plans scans over one snapshot.
#[derive(Debug)]
pub struct ScanPlanner<'a> {
    snapshot: &'a LogSnapshot,
}

impl<'a> ScanPlanner<'a> {
    pub fn new(snapshot: &'a LogSnapshot) -> Self {
        Self { snapshot }
    }

    /// Plan a scan bound to the current revision.
    pub fn plan(&self, sample: Option<&SamplePushdown>) -> Result<ScanPlan> {
        let revision = self
            .snapshot
            .current_revision()
            .ok_or_else(|| QueryError::not_initialized("no revision committed"))?;
        self.plan_for_revision(revision.id, sample)
    }

    /// Plan a scan bound to a specific revision.
    ///
    /// Rows written under older revisions (and the unindexed staging area)
    /// stay queryable: weights are a function of raw values only, so the
    /// weight-range predicate applies to every live file regardless of the
    /// revision that wrote it.
    pub fn plan_for_revision(
        &self,
        revision_id: u64,
        sample: Option<&SamplePushdown>,
    ) -> Result<ScanPlan> {
        let revision = self.snapshot.revision(revision_id).ok_or_else(|| {
            QueryError::revision_mismatch(format!(
                "revision {} is not present in the log; re-plan against the current snapshot",
                revision_id
            ))
        })?;
        let indexed_columns = revision.columns.clone();

        let mut tasks = Vec::new();
        let mut skipped_files = 0usize;
        for file in self.snapshot.files() {
            let keep = match sample {
                None => true,
                Some(pushdown) => pushdown.range.can_contain(&file.tags),
            };
            if keep {
                tasks.push(ScanTask { file: file.clone() });
            } else {
                skipped_files += 1;
            }
        }

        let residual = sample.filter(|p| p.needs_residual()).map(|p| p.range);

        tracing::debug!(
            revision = revision_id,
            files = tasks.len(),
            skipped = skipped_files,
            residual = residual.is_some(),
            "scan planned"
        );

        Ok(ScanPlan {
            revision_id,
            indexed_columns,
            tasks,
            residual,
            skipped_files,
        })
    }

    /// Whether the snapshot holds unindexed staging rows.
    pub fn has_staging(&self) -> bool {
        !self
            .snapshot
            .files_for_revision(STAGING_REVISION_ID)
            .is_empty()
    }
}

/// Apply the residual weight filter to a decoded block.
///
/// Returns the indices of matching rows, recomputing each row's weight with
/// the same hash the writer used.
pub fn filter_batch(
    batch: &ColumnBatch,
    indexed_columns: &[String],
    seed: u32,
    range: &WeightRange,
) -> Result<Vec<usize>> {
    let columns = batch.schema().project(indexed_columns)?;
    let mut matching = Vec::new();
    for i in 0..batch.num_rows() {
        let w = weight_of(&batch.values_at(i, &columns), seed);
        if range.contains(w) {
            matching.push(i);
        }
    }
    Ok(matching)
}

/// Convenience check for a single row's weight.
pub fn residual_matches(weight: Weight, range: &WeightRange) -> bool {
    range.contains(weight)
}

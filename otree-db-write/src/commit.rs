//! The transaction committer: the retrying, rebasing write loop.
//!
//! Protocol against the log, per attempt:
//!
//! 1. Read the current snapshot (version *v*).
//! 2. Resolve the revision: fit the batch against the active transformers
//!    and widen into a successor revision if any value escaped its domain.
//! 3. Index the batch against the revision's state and write one block per
//!    cube under fresh uuid names.
//! 4. Attempt to commit `v -> v+1` with the metadata, remove and add
//!    records.
//! 5. On conflict: if every winning commit is append-only, re-read and redo
//!    steps 1-4 (the indexer is deterministic, so this is the rebase); give
//!    up after `number_of_retries` rebases. Any other conflict fails
//!    immediately.
//!
//! Retries are explicit typed outcomes, never exceptions-as-control-flow. A
//! write abandoned mid-attempt (error or cancellation) has written files no
//! commit references; the external garbage collector owns them.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use otree_db_core::revision::STAGING_REVISION_ID;
use otree_db_core::{BatchSchema, ColumnBatch, EngineConfig, Revision};
use otree_db_index::{fit_revision, Indexer};
use otree_db_log::{LogError, LogRecord, TableMetadata, TransactionLog};

use crate::block_writer::BlockWriter;
use crate::error::{Result, WriteError};
use crate::format::BlockFormat;
use crate::stage::staging_group;

/// What one write wants committed.
#[derive(Debug)]
pub struct WritePlan<'a> {
    pub batch: &'a ColumnBatch,
    pub schema: Arc<BatchSchema>,
    /// Indexed column names (used to seed the first revision).
    pub columns: Vec<String>,
    /// Desired per-cube element count for a first write.
    pub cube_size: usize,
    /// Commit the batch as an unindexed staging block.
    pub stage_only: bool,
    /// Files this write logically replaces (staging rollup, optimize).
    pub remove_paths: Vec<String>,
}

/// Receipt returned after a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Log version the commit installed.
    pub version: u64,
    /// Revision the rows were written under.
    pub revision_id: u64,
    /// Number of AddFile records committed.
    pub files_added: usize,
    /// Number of RemoveFile records committed.
    pub files_removed: usize,
    /// Rows written by this commit.
    pub rows_written: u64,
    /// Attempts used (1 = no conflict).
    pub attempts: usize,
}

/// Single committer for one table. The commit lock is the log's version-CAS;
/// this struct holds no state of its own.
#[derive(Debug)]
pub struct Committer<'a, L: TransactionLog> {
    log: &'a L,
    format: &'a dyn BlockFormat,
    table_root: &'a Path,
    config: &'a EngineConfig,
}

impl<'a, L: TransactionLog> Committer<'a, L> {
    pub fn new(
        log: &'a L,
        format: &'a dyn BlockFormat,
        table_root: &'a Path,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            log,
            format,
            table_root,
            config,
        }
    }

    /// Run the write-commit loop for one plan.
    pub async fn commit_write(&self, plan: &WritePlan<'_>) -> Result<CommitReceipt> {
        if plan.batch.is_empty() && plan.remove_paths.is_empty() {
            // Nothing to commit; report the current version untouched.
            let snapshot = self.log.snapshot().await?;
            return Ok(CommitReceipt {
                version: snapshot.version(),
                revision_id: snapshot.current_revision().map_or(0, |r| r.id),
                files_added: 0,
                files_removed: 0,
                rows_written: 0,
                attempts: 0,
            });
        }

        let indexer = Indexer::new(self.config.cube_weights_buffer_capacity);
        let max_attempts = self.config.number_of_retries + 1;

        for attempt in 1..=max_attempts {
            let snapshot = self.log.snapshot().await?;
            let now_ms = Utc::now().timestamp_millis();

            // Resolve the revision and index the batch
            let (revision, groups, needs_metadata) = if plan.stage_only {
                let revision = snapshot
                    .revision(STAGING_REVISION_ID)
                    .cloned()
                    .unwrap_or_else(|| {
                        Revision::staging(plan.columns.clone(), plan.cube_size, now_ms)
                    });
                let needs_metadata = snapshot.revision(STAGING_REVISION_ID).is_none();
                let group = staging_group(plan.batch, &revision, self.config.weight_seed)?;
                (revision, vec![group], needs_metadata)
            } else {
                let base = snapshot.current_revision().cloned().unwrap_or_else(|| {
                    Revision::staging(plan.columns.clone(), plan.cube_size, now_ms)
                });
                let revision = fit_revision(plan.batch, &base, now_ms)?.unwrap_or(base);
                let needs_metadata = snapshot.revision(revision.id).is_none();
                let state = snapshot.index_state_excluding(&revision, &plan.remove_paths);
                let result =
                    indexer.index_batch(plan.batch, &revision, &state, self.config.weight_seed)?;
                (revision, result.groups, needs_metadata)
            };

            // Write blocks under fresh names. A failed partition is retried
            // once (fresh names make the retry idempotent), then surfaced.
            let writer = BlockWriter::new(self.format, self.table_root);
            let adds = match writer
                .write_groups(plan.batch, &plan.schema, &groups, revision.id)
                .await
            {
                Ok(adds) => adds,
                Err(e) => {
                    tracing::warn!(error = %e, "block writer failed, retrying partition");
                    writer
                        .write_groups(plan.batch, &plan.schema, &groups, revision.id)
                        .await?
                }
            };

            // Assemble the atomic record set
            let mut records = Vec::with_capacity(adds.len() + plan.remove_paths.len() + 1);
            if needs_metadata {
                records.push(LogRecord::Metadata(TableMetadata {
                    revision: revision.clone(),
                    schema: plan.schema.fields.clone(),
                }));
            }
            records.extend(plan.remove_paths.iter().map(|path| LogRecord::RemoveFile {
                path: path.clone(),
            }));
            let files_added = adds.len();
            records.extend(adds.into_iter().map(LogRecord::AddFile));

            match self.log.try_commit(snapshot.version(), records).await {
                Ok(commit) => {
                    tracing::info!(
                        version = commit.version,
                        revision = revision.id,
                        files_added,
                        files_removed = plan.remove_paths.len(),
                        rows = plan.batch.num_rows(),
                        attempts = attempt,
                        "write committed"
                    );
                    return Ok(CommitReceipt {
                        version: commit.version,
                        revision_id: revision.id,
                        files_added,
                        files_removed: plan.remove_paths.len(),
                        rows_written: plan.batch.num_rows() as u64,
                        attempts: attempt,
                    });
                }
                Err(LogError::Conflict {
                    actual_version,
                    winners,
                    ..
                }) => {
                    if !winners.iter().all(|c| c.is_append_only()) {
                        tracing::warn!(
                            read_version = snapshot.version(),
                            actual_version,
                            "conflicting commit is not append-only; giving up"
                        );
                        return Err(WriteError::ConflictNotRebasable);
                    }
                    if attempt == max_attempts {
                        return Err(WriteError::CommitConflict { attempts: attempt });
                    }
                    tracing::warn!(
                        read_version = snapshot.version(),
                        actual_version,
                        attempt,
                        "commit conflict, rebasing on updated state"
                    );
                    // Loop re-reads the snapshot and re-runs the indexer;
                    // files from this attempt are unreferenced garbage.
                }
                Err(e) => return Err(e.into()),
            }
        }
        unreachable!("retry loop returns on success or final failure")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::JsonBlockFormat;
    use otree_db_core::batch::{FieldInfo, FieldType};
    use otree_db_core::Value;
    use otree_db_log::MemoryLog;

    fn schema() -> Arc<BatchSchema> {
        Arc::new(
            BatchSchema::new(vec![
                FieldInfo::new("x", FieldType::Int64, false),
                FieldInfo::new("y", FieldType::Int64, false),
            ])
            .unwrap(),
        )
    }

    fn batch(n: usize) -> ColumnBatch {
        let mut batch = ColumnBatch::empty(schema());
        for i in 0..n {
            batch
                .push_row(vec![
                    Value::Int64((i % 97) as i64),
                    Value::Int64((i % 83) as i64),
                ])
                .unwrap();
        }
        batch
    }

    fn plan<'a>(b: &'a ColumnBatch, stage_only: bool) -> WritePlan<'a> {
        WritePlan {
            batch: b,
            schema: schema(),
            columns: vec!["x".to_string(), "y".to_string()],
            cube_size: 100,
            stage_only,
            remove_paths: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_first_write_installs_revision() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let format = JsonBlockFormat;
        let config = EngineConfig::default();
        let committer = Committer::new(&log, &format, dir.path(), &config);

        let b = batch(250);
        let receipt = committer.commit_write(&plan(&b, false)).await.unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(receipt.revision_id, 1);
        assert_eq!(receipt.attempts, 1);
        assert!(receipt.files_added >= 1);

        let snapshot = log.snapshot().await.unwrap();
        assert_eq!(snapshot.current_revision().unwrap().id, 1);
        assert_eq!(snapshot.total_elements(), 250);
    }

    #[tokio::test]
    async fn test_staging_write_uses_revision_zero() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let format = JsonBlockFormat;
        let config = EngineConfig::default();
        let committer = Committer::new(&log, &format, dir.path(), &config);

        let b = batch(10);
        let receipt = committer.commit_write(&plan(&b, true)).await.unwrap();
        assert_eq!(receipt.revision_id, STAGING_REVISION_ID);
        assert_eq!(receipt.files_added, 1);

        let snapshot = log.snapshot().await.unwrap();
        assert_eq!(snapshot.files_for_revision(STAGING_REVISION_ID).len(), 1);
    }

    #[tokio::test]
    async fn test_empty_write_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let format = JsonBlockFormat;
        let config = EngineConfig::default();
        let committer = Committer::new(&log, &format, dir.path(), &config);

        let b = ColumnBatch::empty(schema());
        let receipt = committer.commit_write(&plan(&b, false)).await.unwrap();
        assert_eq!(receipt.version, 0);
        assert_eq!(receipt.files_added, 0);
        assert_eq!(log.snapshot().await.unwrap().version(), 0);
    }

    #[tokio::test]
    async fn test_second_write_widens_revision() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let format = JsonBlockFormat;
        let config = EngineConfig::default();
        let committer = Committer::new(&log, &format, dir.path(), &config);

        let first = batch(50);
        committer.commit_write(&plan(&first, false)).await.unwrap();

        // Values far outside the fitted [0, 96] x [0, 82] domains
        let mut wide = ColumnBatch::empty(schema());
        wide.push_row(vec![Value::Int64(10_000), Value::Int64(-4)])
            .unwrap();
        let receipt = committer.commit_write(&plan(&wide, false)).await.unwrap();
        assert_eq!(receipt.revision_id, 2);

        let snapshot = log.snapshot().await.unwrap();
        assert_eq!(snapshot.current_revision().unwrap().id, 2);
        // Old files remain live under revision 1
        assert!(!snapshot.files_for_revision(1).is_empty());
        assert!(!snapshot.files_for_revision(2).is_empty());
    }

    #[tokio::test]
    async fn test_conflict_rebases_and_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let format = JsonBlockFormat;
        let config = EngineConfig::default();
        let committer = Committer::new(&log, &format, dir.path(), &config);

        let first = batch(40);
        committer.commit_write(&plan(&first, false)).await.unwrap();

        // Sneak a competing append-only commit in by another committer, then
        // write with a stale-read simulation: the loop must absorb it.
        let other_dir = tempfile::tempdir().unwrap();
        let other = Committer::new(&log, &format, other_dir.path(), &config);
        let second = batch(30);
        let third = batch(20);
        let plan_second = plan(&second, false);
        let plan_third = plan(&third, false);
        let (a, b) = tokio::join!(
            other.commit_write(&plan_second),
            committer.commit_write(&plan_third)
        );
        a.unwrap();
        b.unwrap();

        let snapshot = log.snapshot().await.unwrap();
        assert_eq!(snapshot.version(), 3);
        assert_eq!(snapshot.total_elements(), 90);
    }
}

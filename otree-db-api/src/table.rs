//! The table facade: the embedding surface a host engine talks to.
//!
//! A `Table` wires a transaction log, a block format and the engine config
//! into the full pipeline: writes run fit -> index -> block-write -> commit
//! with staging and rebase handled here; reads plan scans over a snapshot
//! and apply the residual sample filter; `analyze` / `optimize` are the DDL
//! commands.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use otree_db_core::{
    BatchSchema, ColumnBatch, CoreError, CubeId, CubeState, EngineConfig,
};
use otree_db_index::{analyze, plan_optimize, AnalyzeOptions};
use otree_db_log::{FileLog, LogError, LogRecord, LogSnapshot, TransactionLog};
use otree_db_query::{rewrite_sample, filter_batch, ScanPlan, ScanPlanner};
use otree_db_write::{
    staged_bytes, staged_paths, BlockFormat, CommitReceipt, Committer, JsonBlockFormat,
    StagingPolicy, WritePlan,
};

use crate::error::{ApiError, Result};
use crate::options::WriteOptions;

/// One OTree-indexed table.
#[derive(Debug)]
pub struct Table<L: TransactionLog> {
    root: PathBuf,
    log: L,
    format: Arc<dyn BlockFormat>,
    config: EngineConfig,
}

impl Table<FileLog> {
    /// Open (creating if needed) a table directory with the file log and the
    /// reference block format.
    pub async fn open(root: impl Into<PathBuf>, config: EngineConfig) -> Result<Self> {
        let root = root.into();
        let log = FileLog::open(&root).await?;
        Ok(Self {
            root,
            log,
            format: Arc::new(JsonBlockFormat),
            config,
        })
    }
}

impl<L: TransactionLog> Table<L> {
    /// Assemble a table over an arbitrary log and block format.
    pub fn with_log(
        root: impl Into<PathBuf>,
        log: L,
        format: Arc<dyn BlockFormat>,
        config: EngineConfig,
    ) -> Self {
        Self {
            root: root.into(),
            log,
            format,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The current log snapshot.
    pub async fn snapshot(&self) -> Result<LogSnapshot> {
        Ok(self.log.snapshot().await?)
    }

    /// Append a batch.
    ///
    /// The first write must carry `columnsToIndex`; later writes inherit the
    /// table's indexed columns and must not contradict them. Depending on
    /// the staging option the batch is either committed unindexed into the
    /// staging area or indexed (together with any staged rows, which the
    /// same commit retires).
    pub async fn write(
        &self,
        batch: &ColumnBatch,
        options: &WriteOptions,
    ) -> Result<CommitReceipt> {
        let snapshot = self.log.snapshot().await?;

        let (columns, cube_size) = match snapshot.current_revision() {
            Some(revision) => {
                if let Some(requested) = &options.columns_to_index {
                    if *requested != revision.columns {
                        return Err(ApiError::ColumnsMismatch {
                            existing: revision.columns.clone(),
                            requested: requested.clone(),
                        });
                    }
                }
                (revision.columns.clone(), revision.desired_cube_size)
            }
            None => {
                let columns = options
                    .columns_to_index
                    .clone()
                    .ok_or(ApiError::ColumnsRequired)?;
                (
                    columns,
                    options.cube_size.unwrap_or(self.config.default_cube_size),
                )
            }
        };

        if let Some(existing) = snapshot.schema() {
            if existing != batch.schema().fields.as_slice() {
                return Err(CoreError::schema(
                    "batch schema does not match the table schema",
                )
                .into());
            }
        }
        // An unresolvable indexed column is fatal before any file is written
        batch.schema().project(&columns)?;

        let committer = Committer::new(&self.log, self.format.as_ref(), &self.root, &self.config);
        let policy = StagingPolicy {
            staging_size_in_bytes: options.staging_size_in_bytes,
        };
        let already_staged = staged_bytes(&snapshot);
        let incoming = batch.estimated_bytes() as u64;

        if policy.should_stage(already_staged, incoming) {
            let plan = WritePlan {
                batch,
                schema: batch.schema().clone(),
                columns,
                cube_size,
                stage_only: true,
                remove_paths: Vec::new(),
            };
            return Ok(committer.commit_write(&plan).await?);
        }

        let staged = staged_paths(&snapshot);
        if staged.is_empty() {
            let plan = WritePlan {
                batch,
                schema: batch.schema().clone(),
                columns,
                cube_size,
                stage_only: false,
                remove_paths: Vec::new(),
            };
            return Ok(committer.commit_write(&plan).await?);
        }

        // Roll the staging area up into this indexed write
        let schema = batch.schema().clone();
        let mut combined = ColumnBatch::empty(schema.clone());
        for path in &staged {
            let block = self
                .format
                .read_batch(&self.root.join(path), schema.clone())
                .await
                .map_err(ApiError::Write)?;
            combined.extend(&block)?;
        }
        combined.extend(batch)?;
        tracing::info!(
            staged_files = staged.len(),
            staged_rows = combined.num_rows() - batch.num_rows(),
            incoming_rows = batch.num_rows(),
            "staging area rolled up into indexed write"
        );
        let plan = WritePlan {
            batch: &combined,
            schema,
            columns,
            cube_size,
            stage_only: false,
            remove_paths: staged,
        };
        Ok(committer.commit_write(&plan).await?)
    }

    /// Total row count, answered from file tags alone.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.log.snapshot().await?.total_elements())
    }

    /// Read the whole table back.
    pub async fn scan(&self) -> Result<ColumnBatch> {
        let snapshot = self.log.snapshot().await?;
        let schema = self.schema_from(&snapshot)?;
        let plan = ScanPlanner::new(&snapshot).plan(None)?;
        self.read_plan(&plan, schema).await
    }

    /// Read a uniform sample of fraction `fraction`, without replacement.
    pub async fn sample(&self, fraction: f64) -> Result<ColumnBatch> {
        let snapshot = self.log.snapshot().await?;
        let schema = self.schema_from(&snapshot)?;
        let pushdown = rewrite_sample(fraction);
        let plan = ScanPlanner::new(&snapshot).plan(Some(&pushdown))?;
        tracing::info!(
            fraction = pushdown.fraction,
            files = plan.tasks.len(),
            skipped = plan.skipped_files,
            "sample scan planned"
        );
        self.read_plan(&plan, schema).await
    }

    /// Plan a sample scan without executing it (file-skipping visibility).
    pub async fn sample_plan(&self, fraction: f64) -> Result<ScanPlan> {
        let snapshot = self.log.snapshot().await?;
        let pushdown = rewrite_sample(fraction);
        Ok(ScanPlanner::new(&snapshot).plan(Some(&pushdown))?)
    }

    /// ANALYZE: nominate cubes of a revision for optimization and announce
    /// them on the log (advisory; never affects read correctness).
    pub async fn analyze(&self, revision_id: u64) -> Result<Vec<CubeId>> {
        let snapshot = self.log.snapshot().await?;
        let revision = snapshot
            .revision(revision_id)
            .ok_or_else(|| {
                otree_db_query::QueryError::revision_mismatch(format!(
                    "revision {} not found",
                    revision_id
                ))
            })?
            .clone();
        let candidates = analyze(
            &snapshot,
            &revision,
            &self.config,
            &AnalyzeOptions::default(),
            Utc::now().timestamp_millis(),
        );
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let records: Vec<LogRecord> = snapshot
            .files_for_revision(revision_id)
            .into_iter()
            .filter(|f| f.tags.state == CubeState::Flooded && candidates.contains(&f.tags.cube))
            .map(|f| {
                let mut add = f.clone();
                add.tags.state = CubeState::Announced;
                LogRecord::AddFile(add)
            })
            .collect();
        if !records.is_empty() {
            match self.log.try_commit(snapshot.version(), records).await {
                Ok(commit) => tracing::info!(
                    version = commit.version,
                    cubes = candidates.len(),
                    "optimization candidates announced"
                ),
                Err(LogError::Conflict { .. }) => tracing::warn!(
                    "announce lost a commit race; nominations stay advisory"
                ),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(candidates)
    }

    /// OPTIMIZE: rewrite the subtrees under the given cubes, re-indexing
    /// their rows and retiring the replaced files in one atomic commit.
    pub async fn optimize(
        &self,
        revision_id: u64,
        cubes: &[CubeId],
    ) -> Result<CommitReceipt> {
        let snapshot = self.log.snapshot().await?;
        let revision = snapshot
            .revision(revision_id)
            .ok_or_else(|| {
                otree_db_query::QueryError::revision_mismatch(format!(
                    "revision {} not found",
                    revision_id
                ))
            })?
            .clone();
        let plan = plan_optimize(&snapshot, &revision, cubes)?;
        let schema = self.schema_from(&snapshot)?;

        let mut batch = ColumnBatch::empty(schema.clone());
        let mut remove_paths = Vec::new();
        for path in plan.file_paths() {
            let block = self
                .format
                .read_batch(&self.root.join(path), schema.clone())
                .await
                .map_err(ApiError::Write)?;
            batch.extend(&block)?;
            remove_paths.push(path.to_string());
        }

        tracing::info!(
            revision = revision_id,
            subtrees = plan.groups.len(),
            files = remove_paths.len(),
            rows = batch.num_rows(),
            "optimize rewriting subtrees"
        );

        let committer = Committer::new(&self.log, self.format.as_ref(), &self.root, &self.config);
        let write_plan = WritePlan {
            batch: &batch,
            schema,
            columns: revision.columns.clone(),
            cube_size: revision.desired_cube_size,
            stage_only: false,
            remove_paths,
        };
        Ok(committer.commit_write(&write_plan).await?)
    }

    fn schema_from(&self, snapshot: &LogSnapshot) -> Result<Arc<BatchSchema>> {
        let fields = snapshot.schema().ok_or_else(|| {
            otree_db_query::QueryError::not_initialized(format!(
                "{} has no committed schema",
                self.root.display()
            ))
        })?;
        Ok(Arc::new(BatchSchema::new(fields.to_vec())?))
    }

    async fn read_plan(
        &self,
        plan: &ScanPlan,
        schema: Arc<BatchSchema>,
    ) -> Result<ColumnBatch> {
        let mut out = ColumnBatch::empty(schema.clone());
        for task in &plan.tasks {
            let block = self
                .format
                .read_batch(&self.root.join(&task.file.path), schema.clone())
                .await
                .map_err(ApiError::Write)?;
            match &plan.residual {
                None => out.extend(&block)?,
                Some(range) => {
                    let matching = filter_batch(
                        &block,
                        &plan.indexed_columns,
                        self.config.weight_seed,
                        range,
                    )?;
                    for i in matching {
                        out.push_row(block.row(i))?;
                    }
                }
            }
        }
        Ok(out)
    }
}

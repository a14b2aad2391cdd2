//! Log snapshots: the fold of all committed records at one version.
//!
//! A snapshot is always the reduction of *whole* commits - readers never
//! observe half a commit. The index is fully reconstructible from the
//! snapshot: there is no separate index file.

use std::collections::BTreeMap;

use otree_db_core::batch::FieldInfo;
use otree_db_core::{IndexState, Revision};

use crate::record::{AddFile, Commit, LogRecord, TableMetadata};

/// The state of a table's log at one version.
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    version: u64,
    /// Live files by path. Re-adding a path replaces its entry.
    files: BTreeMap<String, AddFile>,
    /// Metadata records in installation order; the last one is current.
    metadata: Vec<TableMetadata>,
}

impl LogSnapshot {
    /// Snapshot of an empty log (version 0).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold a sequence of commits, in version order, into a snapshot.
    pub fn fold<'a>(commits: impl IntoIterator<Item = &'a Commit>) -> Self {
        let mut snapshot = Self::empty();
        for commit in commits {
            snapshot.apply(commit);
        }
        snapshot
    }

    /// Apply one whole commit.
    pub fn apply(&mut self, commit: &Commit) {
        debug_assert_eq!(commit.version, self.version + 1, "commits applied in order");
        for record in &commit.records {
            match record {
                LogRecord::AddFile(add) => {
                    self.files.insert(add.path.clone(), add.clone());
                }
                LogRecord::RemoveFile { path } => {
                    self.files.remove(path);
                }
                LogRecord::Metadata(meta) => {
                    self.metadata.push(meta.clone());
                }
            }
        }
        self.version = commit.version;
    }

    /// The latest committed version; 0 for an empty log.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the table has any metadata installed.
    pub fn is_initialized(&self) -> bool {
        !self.metadata.is_empty()
    }

    /// The currently active metadata (latest installed).
    pub fn current_metadata(&self) -> Option<&TableMetadata> {
        self.metadata.last()
    }

    /// The currently active revision.
    pub fn current_revision(&self) -> Option<&Revision> {
        self.current_metadata().map(|m| &m.revision)
    }

    /// Look up a revision by id.
    pub fn revision(&self, revision_id: u64) -> Option<&Revision> {
        self.metadata
            .iter()
            .rev()
            .map(|m| &m.revision)
            .find(|r| r.id == revision_id)
    }

    /// The table schema (from the latest metadata).
    pub fn schema(&self) -> Option<&[FieldInfo]> {
        self.current_metadata().map(|m| m.schema.as_slice())
    }

    /// All live files, in path order.
    pub fn files(&self) -> impl Iterator<Item = &AddFile> {
        self.files.values()
    }

    /// Number of live files.
    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    /// Live files tagged with one revision.
    pub fn files_for_revision(&self, revision_id: u64) -> Vec<&AddFile> {
        self.files
            .values()
            .filter(|f| f.tags.revision_id == revision_id)
            .collect()
    }

    /// Total row count across live files.
    pub fn total_elements(&self) -> u64 {
        self.files.values().map(|f| f.tags.element_count).sum()
    }

    /// Reduce one revision's live block tags into an index state.
    pub fn index_state(&self, revision: &Revision) -> IndexState {
        self.index_state_excluding(revision, &[])
    }

    /// Like [`LogSnapshot::index_state`], but with some paths left out -
    /// used when a write is about to remove those files and must not place
    /// rows against cutoffs that will no longer exist.
    pub fn index_state_excluding(&self, revision: &Revision, exclude: &[String]) -> IndexState {
        IndexState::from_blocks(
            revision.id,
            revision.dims(),
            self.files
                .values()
                .filter(|f| f.tags.revision_id == revision.id)
                .filter(|f| !exclude.contains(&f.path))
                .map(|f| &f.tags),
        )
    }
}

//! File-backed transaction log.
//!
//! One JSON file per version under `_otree_log/` in the table directory:
//!
//! ```text
//! {table}/_otree_log/00000000000000000001.json
//! {table}/_otree_log/00000000000000000002.json
//! ```
//!
//! The version-CAS primitive is a hard link from a fully-written temp file
//! onto the target version name: linking is atomic and fails when the name
//! exists, so the loser of a race always observes a complete winning commit.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{LogError, Result};
use crate::log::TransactionLog;
use crate::record::{Commit, LogRecord};
use crate::snapshot::LogSnapshot;

/// Name of the log directory inside a table directory.
pub const LOG_DIR_NAME: &str = "_otree_log";

/// File-backed log for one table.
#[derive(Debug, Clone)]
pub struct FileLog {
    log_dir: PathBuf,
}

impl FileLog {
    /// Open (creating if needed) the log for a table directory.
    pub async fn open(table_root: impl AsRef<Path>) -> Result<Self> {
        let log_dir = table_root.as_ref().join(LOG_DIR_NAME);
        tokio::fs::create_dir_all(&log_dir).await?;
        Ok(Self { log_dir })
    }

    fn version_path(&self, version: u64) -> PathBuf {
        self.log_dir.join(format!("{:020}.json", version))
    }

    /// List committed versions in ascending order.
    async fn list_versions(&self) -> Result<Vec<u64>> {
        let mut versions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.log_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(version) = stem.parse::<u64>() {
                    versions.push(version);
                }
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    async fn read_commit(&self, version: u64) -> Result<Commit> {
        let path = self.version_path(version);
        let bytes = tokio::fs::read(&path).await?;
        let commit: Commit = serde_json::from_slice(&bytes)
            .map_err(|e| LogError::corrupt(format!("{}: {}", path.display(), e)))?;
        if commit.version != version {
            return Err(LogError::corrupt(format!(
                "{} holds commit version {}",
                path.display(),
                commit.version
            )));
        }
        Ok(commit)
    }
}

#[async_trait]
impl TransactionLog for FileLog {
    async fn snapshot(&self) -> Result<LogSnapshot> {
        let versions = self.list_versions().await?;
        let mut snapshot = LogSnapshot::empty();
        for (i, &version) in versions.iter().enumerate() {
            if version != i as u64 + 1 {
                return Err(LogError::corrupt(format!(
                    "log has a gap: expected version {}, found {}",
                    i + 1,
                    version
                )));
            }
            snapshot.apply(&self.read_commit(version).await?);
        }
        Ok(snapshot)
    }

    async fn commits_since(&self, version: u64) -> Result<Vec<Commit>> {
        let versions = self.list_versions().await?;
        let mut commits = Vec::new();
        for v in versions.into_iter().filter(|&v| v > version) {
            commits.push(self.read_commit(v).await?);
        }
        Ok(commits)
    }

    async fn try_commit(&self, read_version: u64, records: Vec<LogRecord>) -> Result<Commit> {
        let commit = Commit {
            version: read_version + 1,
            timestamp_ms: Utc::now().timestamp_millis(),
            records,
        };
        let bytes = serde_json::to_vec_pretty(&commit)?;

        // Stage the whole commit, then claim the version name atomically.
        let tmp_path = self.log_dir.join(format!(".{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp_path, &bytes).await?;

        let target = self.version_path(commit.version);
        let link_result = tokio::fs::hard_link(&tmp_path, &target).await;
        let _ = tokio::fs::remove_file(&tmp_path).await;

        match link_result {
            Ok(()) => {
                tracing::debug!(
                    version = commit.version,
                    records = commit.records.len(),
                    path = %target.display(),
                    "commit written"
                );
                Ok(commit)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let winners = self.commits_since(read_version).await?;
                let actual_version = winners.last().map_or(read_version, |c| c.version);
                Err(LogError::Conflict {
                    read_version,
                    actual_version,
                    winners,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

//! In-memory transaction log for tests and embedded use.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{LogError, Result};
use crate::log::TransactionLog;
use crate::record::{Commit, LogRecord};
use crate::snapshot::LogSnapshot;

/// In-memory log: a shared, ordered list of commits behind a lock.
///
/// Clones share the same underlying log, which is what concurrent-writer
/// tests want.
#[derive(Debug, Clone)]
pub struct MemoryLog {
    commits: Arc<RwLock<Vec<Commit>>>,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        Self {
            commits: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl TransactionLog for MemoryLog {
    async fn snapshot(&self) -> Result<LogSnapshot> {
        let commits = self
            .commits
            .read()
            .map_err(|_| LogError::io("memory log lock poisoned"))?;
        Ok(LogSnapshot::fold(commits.iter()))
    }

    async fn commits_since(&self, version: u64) -> Result<Vec<Commit>> {
        let commits = self
            .commits
            .read()
            .map_err(|_| LogError::io("memory log lock poisoned"))?;
        Ok(commits
            .iter()
            .filter(|c| c.version > version)
            .cloned()
            .collect())
    }

    async fn try_commit(&self, read_version: u64, records: Vec<LogRecord>) -> Result<Commit> {
        let mut commits = self
            .commits
            .write()
            .map_err(|_| LogError::io("memory log lock poisoned"))?;
        let actual_version = commits.len() as u64;
        if actual_version != read_version {
            let winners = commits
                .iter()
                .filter(|c| c.version > read_version)
                .cloned()
                .collect();
            return Err(LogError::Conflict {
                read_version,
                actual_version,
                winners,
            });
        }
        let commit = Commit {
            version: read_version + 1,
            timestamp_ms: Utc::now().timestamp_millis(),
            records,
        };
        commits.push(commit.clone());
        Ok(commit)
    }
}

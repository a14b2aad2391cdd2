//! The transaction log trait.
//!
//! The engine depends only on this abstract API. A log supports reading the
//! current snapshot and atomically committing a list of records against the
//! version the writer read - optimistic version-CAS, not a mutex. Two
//! concurrent writers serialize at the commit point; the loser receives a
//! [`LogError::Conflict`] carrying the winning commits and decides whether
//! to rebase.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::Result;
use crate::record::{Commit, LogRecord};
use crate::snapshot::LogSnapshot;

/// Atomic version-CAS commit log for one table.
#[async_trait]
pub trait TransactionLog: Debug + Send + Sync {
    /// Read the current snapshot: the fold of all whole commits.
    async fn snapshot(&self) -> Result<LogSnapshot>;

    /// All commits with version strictly greater than `version`, in order.
    async fn commits_since(&self, version: u64) -> Result<Vec<Commit>>;

    /// Atomically commit `records` as version `read_version + 1`.
    ///
    /// Fails with [`LogError::Conflict`] if any commit landed after
    /// `read_version`; the conflict carries the winning commits.
    ///
    /// [`LogError::Conflict`]: crate::error::LogError::Conflict
    async fn try_commit(&self, read_version: u64, records: Vec<LogRecord>) -> Result<Commit>;
}

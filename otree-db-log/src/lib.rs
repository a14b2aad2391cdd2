//! # otree-db-log
//!
//! Transaction log abstraction for OTree tables. The engine's only durable
//! state is an append-only sequence of commits, each an atomic batch of
//! `AddFile` / `RemoveFile` / `Metadata` records; the multidimensional index
//! is fully reconstructible from the file tags in the log.
//!
//! The [`TransactionLog`] trait is the seam to the host's real log. Two
//! reference backends ship here:
//!
//! - [`MemoryLog`] - shared in-memory commits, for tests and embedding
//! - [`FileLog`] - one JSON file per version with hard-link CAS semantics

pub mod error;
pub mod file;
pub mod log;
pub mod memory;
pub mod record;
pub mod snapshot;

pub use error::{LogError, Result};
pub use file::{FileLog, LOG_DIR_NAME};
pub use log::TransactionLog;
pub use memory::MemoryLog;
pub use record::{AddFile, Commit, LogRecord, TableMetadata};
pub use snapshot::LogSnapshot;

//! # otree-db-write
//!
//! The write pipeline for OTree tables: rows in, an atomic commit of tagged
//! immutable block files out.
//!
//! - [`format`] - the pluggable block-file seam and the JSON reference format
//! - [`block_writer`] - one output file per cube per partition
//! - [`stage`] - the unindexed staging area for small appends
//! - [`commit`] - the retrying, rebasing transaction committer

pub mod block_writer;
pub mod commit;
pub mod error;
pub mod format;
pub mod stage;

pub use block_writer::{BlockWriter, DATA_DIR_NAME};
pub use commit::{CommitReceipt, Committer, WritePlan};
pub use error::{Result, WriteError};
pub use format::{BlockFormat, BlockRowWriter, FileStats, JsonBlockFormat};
pub use stage::{staged_bytes, staged_paths, staging_group, StagingPolicy};

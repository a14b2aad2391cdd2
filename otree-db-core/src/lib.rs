//! # otree-db-core
//!
//! Core data model for the OTree multidimensional index: a deterministic
//! space-partitioning tree over a normalized key space whose per-cube row
//! samples union into statistically uniform samples of the whole table.
//!
//! This crate holds everything both the write pipeline and the query planner
//! must agree on bit-for-bit:
//!
//! - [`weight`] - the 32-bit pseudo-random row weight and its single shared
//!   hash implementation (writer placement and scan filters use the same
//!   function)
//! - [`transform`] - per-column normalization into `[0, 1]`
//! - [`cube`] - cube identifiers: stable tree addresses as bit-strings
//! - [`revision`] - immutable indexing-configuration snapshots
//! - [`block`] - per-file tags carried on the transaction log
//! - [`state`] - the per-revision reduction of block tags, with the row
//!   placement descent
//! - [`batch`] / [`value`] - the columnar row model
//! - [`config`] - process-scope engine knobs

pub mod batch;
pub mod block;
pub mod config;
pub mod cube;
pub mod error;
pub mod revision;
pub mod state;
pub mod transform;
pub mod value;
pub mod weight;

pub use batch::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};
pub use block::{BlockTags, CubeState};
pub use config::EngineConfig;
pub use cube::{CubeId, Point, MAX_DIMENSIONS};
pub use error::{CoreError, Result};
pub use revision::{Revision, STAGING_REVISION_ID};
pub use state::{CubeNode, IndexState};
pub use transform::{ColumnStats, Projection, Transformer};
pub use value::Value;
pub use weight::{weight_of, Weight, DEFAULT_WEIGHT_SEED, MAX_WEIGHT, MIN_WEIGHT};

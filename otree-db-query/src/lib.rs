//! # otree-db-query
//!
//! The read side of the OTree index: rewrite uniform-sample operators into
//! weight-range predicates, plan scans that skip files by their weight tags,
//! and evaluate the residual row filter on surviving blocks.
//!
//! Plan representation, expression evaluation and scan execution belong to
//! the host query engine; this crate supplies the pieces it plugs in - the
//! [`rewrite::index_hash`] scalar, the [`rewrite::rewrite_sample`]
//! transformation, and the [`scan::ScanPlanner`].

pub mod error;
pub mod pushdown;
pub mod rewrite;
pub mod scan;

pub use error::{QueryError, Result};
pub use pushdown::WeightRange;
pub use rewrite::{index_hash, rewrite_sample, SamplePushdown};
pub use scan::{filter_batch, residual_matches, ScanPlan, ScanPlanner, ScanTask};

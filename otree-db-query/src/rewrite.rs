//! The sample-to-filter rewrite.
//!
//! A logical "uniform sample, fraction *f*, without replacement" sitting
//! directly above a scan of an indexed table is replaced by a predicate
//!
//! ```text
//! index_hash(indexed-cols, seed) in [MIN_WEIGHT, MIN_WEIGHT + f * 2^32)
//! ```
//!
//! attached twice: as a file-skipping predicate on the scan (dropping every
//! file whose weight-tag interval is disjoint from the range) and as a
//! residual row filter removing the overshoot from surviving files.
//!
//! Correctness rests on one fact: [`index_hash`] is the very function the
//! writer used to assign weights, so per-row inclusion probability is
//! exactly *f*. The rewrite introduces a pure function over scanned columns,
//! so composing with user filters is plain conjunction - no reordering
//! needed.

use otree_db_core::{weight_of, Value};

use crate::pushdown::WeightRange;

/// The scalar expression injected into scans.
///
/// Exposed to the host engine's filter evaluator; identical keys produce
/// identical hashes, and writer decisions agree because this *is* the weight
/// function.
pub fn index_hash(indexed_values: &[Value], seed: u32) -> i32 {
    weight_of(indexed_values, seed).0
}

/// A rewritten sample operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePushdown {
    /// The requested fraction, clamped to `[0, 1]`.
    pub fraction: f64,
    /// The weight interval implementing it.
    pub range: WeightRange,
}

impl SamplePushdown {
    /// Whether surviving files still need the residual row filter.
    ///
    /// A full range admits every row, so nothing needs re-checking.
    pub fn needs_residual(&self) -> bool {
        !self.range.is_all()
    }
}

/// Rewrite `Sample(fraction)` into its weight-range predicate.
pub fn rewrite_sample(fraction: f64) -> SamplePushdown {
    let clamped = fraction.clamp(0.0, 1.0);
    let range = WeightRange::for_fraction(clamped);
    tracing::debug!(
        fraction = clamped,
        from = range.from,
        to = range.to,
        "sample rewritten to weight range"
    );
    SamplePushdown {
        fraction: clamped,
        range,
    }
}

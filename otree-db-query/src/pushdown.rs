//! Weight ranges and file skipping.
//!
//! A sample predicate is a half-open interval on the weight axis. The
//! interval lives on i64 so that fraction 1.0 - one past `MAX_WEIGHT` - is
//! representable without wrap-around.
//!
//! Pruning semantics are conservative, like all statistics-based skipping:
//! `can_contain` returning `true` may admit a file with no matching rows
//! (the residual filter removes the overshoot), but `false` is a guarantee
//! the file holds nothing in range.

use serde::{Deserialize, Serialize};

use otree_db_core::{BlockTags, Weight};

/// A half-open interval `[from, to)` on the widened weight axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WeightRange {
    pub from: i64,
    pub to: i64,
}

impl WeightRange {
    /// The whole axis: every weight matches.
    pub fn all() -> Self {
        Self {
            from: i32::MIN as i64,
            to: i32::MAX as i64 + 1,
        }
    }

    /// The empty interval: nothing matches.
    pub fn empty() -> Self {
        Self {
            from: i32::MIN as i64,
            to: i32::MIN as i64,
        }
    }

    /// The interval retaining a uniform `fraction` of rows:
    /// `[MIN, MIN + fraction * 2^32)`.
    pub fn for_fraction(fraction: f64) -> Self {
        Self {
            from: i32::MIN as i64,
            to: Weight::cutoff_for_fraction(fraction),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }

    /// Whether the range admits every possible weight.
    #[inline]
    pub fn is_all(&self) -> bool {
        self.from <= i32::MIN as i64 && self.to > i32::MAX as i64
    }

    /// Whether a row weight falls inside the range.
    #[inline]
    pub fn contains(&self, weight: Weight) -> bool {
        let w = weight.as_i64();
        self.from <= w && w < self.to
    }

    /// Whether a block tagged `[min-weight, max-weight]` might hold rows in
    /// range. `false` means the file can be skipped outright.
    pub fn can_contain(&self, tags: &BlockTags) -> bool {
        if self.is_empty() {
            return false;
        }
        let (min, max) = tags.weight_interval();
        min < self.to && max >= self.from
    }
}

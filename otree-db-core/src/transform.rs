//! Per-column transformers: normalize raw values into `[0, 1]`.
//!
//! Each indexed column carries one transformer in the active revision.
//! `Linear` handles numeric and temporal domains by clamp-and-scale, `Hash`
//! handles categoricals and unbounded domains, and `Empty` stands in before
//! any data has been seen. Variants are tagged data, and `supersedes` /
//! `merge` are pure functions over them - there is no trait object anywhere
//! on this path.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::value::Value;

/// Domain separator for the hash transformer.
const HASH_TRANSFORM_DOMAIN: &[u8] = b"otree:transform:";

/// Default seed for hash transformers.
pub const DEFAULT_HASH_SEED: u64 = 42;

/// 2^53: the largest power of two whose inverse grid is exact in f64.
const HASH_BUCKETS: u64 = 1 << 53;

/// Result of projecting one value through a transformer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Normalized coordinate in `[0, 1]`.
    pub value: f64,
    /// True when the raw value fell outside the transformer's fitted domain
    /// and was clamped. Signals that a wider transformer is desirable.
    pub out_of_domain: bool,
}

impl Projection {
    fn exact(value: f64) -> Self {
        Self {
            value,
            out_of_domain: false,
        }
    }

    fn clamped(value: f64) -> Self {
        Self {
            value,
            out_of_domain: true,
        }
    }
}

/// A per-column normalization function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Transformer {
    /// Clamp-and-scale over a fitted `[min, max]` numeric domain.
    Linear { min: f64, max: f64 },
    /// Stable hash modulo 2^53, divided by 2^53.
    Hash { seed: u64 },
    /// Identity 0 - no data observed yet.
    Empty,
}

impl Transformer {
    /// Project a raw value into `[0, 1]`.
    ///
    /// Never fails: out-of-range values clamp and set the
    /// [`Projection::out_of_domain`] flag so the write pipeline can schedule
    /// a revision upgrade.
    pub fn transform(&self, value: &Value) -> Projection {
        match self {
            Transformer::Empty => Projection::exact(0.0),
            Transformer::Hash { seed } => {
                let mut buf = Vec::with_capacity(HASH_TRANSFORM_DOMAIN.len() + 16);
                buf.extend_from_slice(HASH_TRANSFORM_DOMAIN);
                value.write_stable_bytes(&mut buf);
                let bucket = xxh64(&buf, *seed) % HASH_BUCKETS;
                Projection::exact(bucket as f64 / HASH_BUCKETS as f64)
            }
            Transformer::Linear { min, max } => match value.as_f64_projection() {
                None => Projection::clamped(0.0),
                Some(v) => {
                    if max <= min {
                        // Degenerate single-point domain
                        if v == *min {
                            Projection::exact(0.0)
                        } else {
                            Projection::clamped(0.0)
                        }
                    } else if v < *min {
                        Projection::clamped(0.0)
                    } else if v > *max {
                        Projection::clamped(1.0)
                    } else {
                        Projection::exact((v - min) / (max - min))
                    }
                }
            },
        }
    }

    /// True iff `other`'s domain is contained in `self`'s.
    ///
    /// A transformer supersedes its equal: identical domains do not force a
    /// revision upgrade.
    pub fn supersedes(&self, other: &Transformer) -> bool {
        match (self, other) {
            (_, Transformer::Empty) => true,
            (Transformer::Empty, _) => false,
            (
                Transformer::Linear { min, max },
                Transformer::Linear {
                    min: other_min,
                    max: other_max,
                },
            ) => min <= other_min && max >= other_max,
            (Transformer::Hash { seed }, Transformer::Hash { seed: other_seed }) => {
                seed == other_seed
            }
            // Hash covers unbounded domains; a linear domain never covers a hash one
            (Transformer::Hash { .. }, Transformer::Linear { .. }) => true,
            (Transformer::Linear { .. }, Transformer::Hash { .. }) => false,
        }
    }

    /// Produce a transformer that supersedes both `self` and `other`.
    pub fn merge(&self, other: &Transformer) -> Transformer {
        match (self, other) {
            (Transformer::Empty, t) | (t, Transformer::Empty) => t.clone(),
            (
                Transformer::Linear { min, max },
                Transformer::Linear {
                    min: other_min,
                    max: other_max,
                },
            ) => Transformer::Linear {
                min: min.min(*other_min),
                max: max.max(*other_max),
            },
            (Transformer::Hash { seed }, Transformer::Hash { .. }) => {
                Transformer::Hash { seed: *seed }
            }
            // Mixed numeric/categorical domains fall back to hashing
            (Transformer::Hash { seed }, Transformer::Linear { .. })
            | (Transformer::Linear { .. }, Transformer::Hash { seed }) => {
                Transformer::Hash { seed: *seed }
            }
        }
    }
}

/// Running per-column statistics used to fit a transformer from a batch.
#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    min: Option<f64>,
    max: Option<f64>,
    saw_unprojectable: bool,
    observed: u64,
}

impl ColumnStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one value into the statistics. Nulls are ignored.
    pub fn observe(&mut self, value: &Value) {
        if matches!(value, Value::Null) {
            return;
        }
        self.observed += 1;
        match value.as_f64_projection() {
            Some(v) => {
                self.min = Some(self.min.map_or(v, |m| m.min(v)));
                self.max = Some(self.max.map_or(v, |m| m.max(v)));
            }
            None => self.saw_unprojectable = true,
        }
    }

    /// Fit a transformer to everything observed so far.
    ///
    /// Columns with any non-numeric value fit a hash transformer; purely
    /// numeric columns fit a linear one; columns with no data stay empty.
    pub fn fit(&self) -> Transformer {
        if self.observed == 0 {
            Transformer::Empty
        } else if self.saw_unprojectable {
            Transformer::Hash {
                seed: DEFAULT_HASH_SEED,
            }
        } else {
            Transformer::Linear {
                min: self.min.unwrap_or(0.0),
                max: self.max.unwrap_or(0.0),
            }
        }
    }
}

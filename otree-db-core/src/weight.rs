//! Weights: the 32-bit pseudo-random position every row gets on the sampling
//! axis.
//!
//! A weight is a signed 32-bit hash of the row's indexed column values,
//! uniform over `[i32::MIN, i32::MAX]` for uniformly-distributed keys. The
//! same function, under the name `index_hash`, is what the sample rewriter
//! injects into scans - writer decisions and filter predicates must agree
//! bit-for-bit, so there is exactly one implementation and it lives here.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh32::xxh32;

use crate::value::Value;

/// Domain separator for weight hashing.
const WEIGHT_HASH_DOMAIN: &[u8] = b"otree:weight:";

/// Default deployment-wide hash seed.
///
/// The seed is fixed per deployment, not per table: a predicate computed by
/// one process must match weights assigned by another.
pub const DEFAULT_WEIGHT_SEED: u32 = 42;

/// A row's position on the sampling axis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Weight(pub i32);

/// Smallest possible weight.
pub const MIN_WEIGHT: Weight = Weight(i32::MIN);

/// Largest possible weight. Doubles as the "no cutoff" sentinel on open
/// cubes: a cube whose max weight is `MAX_WEIGHT` accepts every row that
/// reaches it.
pub const MAX_WEIGHT: Weight = Weight(i32::MAX);

/// Span of the weight axis as a float: `i32::MAX - i32::MIN + 1`.
const WEIGHT_SPAN: f64 = (u32::MAX as f64) + 1.0;

impl Weight {
    /// The fraction of the weight axis at or below this weight.
    pub fn fraction(self) -> f64 {
        (self.0 as f64 - i32::MIN as f64) / WEIGHT_SPAN
    }

    /// Map a sample fraction to the weight cutoff `MIN + f * span`, as a
    /// 64-bit offset so that `f = 1.0` (one past `MAX_WEIGHT`) stays
    /// representable.
    pub fn cutoff_for_fraction(fraction: f64) -> i64 {
        let f = fraction.clamp(0.0, 1.0);
        let offset = (f * WEIGHT_SPAN).round() as i64;
        i32::MIN as i64 + offset
    }

    /// Widen to the i64 axis used by half-open query ranges.
    #[inline]
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the weight of a row from its indexed column values.
///
/// The values are concatenated in indexed-column order using their stable
/// byte encodings, domain-separated, and hashed with a seeded 32-bit xxHash.
/// Identical keys produce identical weights.
pub fn weight_of(indexed_values: &[Value], seed: u32) -> Weight {
    let mut buf = Vec::with_capacity(WEIGHT_HASH_DOMAIN.len() + indexed_values.len() * 9);
    buf.extend_from_slice(WEIGHT_HASH_DOMAIN);
    for value in indexed_values {
        value.write_stable_bytes(&mut buf);
    }
    Weight(xxh32(&buf, seed) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_deterministic() {
        let row = vec![Value::Int64(12), Value::String("a".to_string())];
        assert_eq!(weight_of(&row, 42), weight_of(&row, 42));
        assert_ne!(weight_of(&row, 42), weight_of(&row, 43));
    }

    #[test]
    fn test_weight_order_sensitive() {
        let a = vec![Value::Int64(1), Value::Int64(2)];
        let b = vec![Value::Int64(2), Value::Int64(1)];
        assert_ne!(weight_of(&a, 42), weight_of(&b, 42));
    }

    #[test]
    fn test_fraction_endpoints() {
        assert_eq!(MIN_WEIGHT.fraction(), 0.0);
        assert!(MAX_WEIGHT.fraction() < 1.0);
        assert!(MAX_WEIGHT.fraction() > 0.999_999);
    }

    #[test]
    fn test_cutoff_for_fraction() {
        assert_eq!(Weight::cutoff_for_fraction(0.0), i32::MIN as i64);
        // f = 1.0 lands one past MAX_WEIGHT so a half-open range keeps it
        assert_eq!(Weight::cutoff_for_fraction(1.0), i32::MAX as i64 + 1);
        let half = Weight::cutoff_for_fraction(0.5);
        assert_eq!(half, 0);
        // Out-of-range fractions clamp
        assert_eq!(
            Weight::cutoff_for_fraction(2.0),
            Weight::cutoff_for_fraction(1.0)
        );
        assert_eq!(
            Weight::cutoff_for_fraction(-0.5),
            Weight::cutoff_for_fraction(0.0)
        );
    }

    #[test]
    fn test_weight_distribution_is_roughly_uniform() {
        // Bucket 40k distinct keys into 16 weight buckets; each bucket should
        // hold close to 1/16th of the keys.
        let n = 40_000u32;
        let mut buckets = [0u32; 16];
        for i in 0..n {
            let w = weight_of(&[Value::Int64(i as i64)], DEFAULT_WEIGHT_SEED);
            let bucket = ((w.0 as i64 - i32::MIN as i64) * 16 / (1i64 << 32)) as usize;
            buckets[bucket] += 1;
        }
        let expected = n / 16;
        for (i, &count) in buckets.iter().enumerate() {
            let deviation = (count as f64 - expected as f64).abs() / expected as f64;
            assert!(
                deviation < 0.10,
                "bucket {} off by {:.1}% ({} vs {})",
                i,
                deviation * 100.0,
                count,
                expected
            );
        }
    }
}

//! Revisions: immutable snapshots of the indexing configuration.
//!
//! A revision captures the indexed columns, their transformers and the
//! per-cube capacity target at a point in time. Files are tagged with the
//! revision that produced them, and queries filter by revision before
//! applying index predicates. Any transformer-widening operation produces a
//! *new* revision with a higher id; an existing revision never changes.

use serde::{Deserialize, Serialize};

use crate::cube::Point;
use crate::transform::Transformer;
use crate::value::Value;

/// Id of the staging revision: rows written before any index configuration
/// is known are tagged with this revision and re-indexed later.
pub const STAGING_REVISION_ID: u64 = 0;

/// An immutable indexing-configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Revision {
    /// Monotonically increasing revision id; 0 is the staging revision.
    pub id: u64,
    /// Creation time (ms since epoch).
    pub timestamp_ms: i64,
    /// Indexed column names, in index order.
    pub columns: Vec<String>,
    /// One transformer per indexed column.
    pub transformers: Vec<Transformer>,
    /// Desired per-cube element count.
    pub desired_cube_size: usize,
}

impl Revision {
    /// The staging revision: no data observed, all transformers empty.
    pub fn staging(columns: Vec<String>, desired_cube_size: usize, timestamp_ms: i64) -> Self {
        let transformers = columns.iter().map(|_| Transformer::Empty).collect();
        Self {
            id: STAGING_REVISION_ID,
            timestamp_ms,
            columns,
            transformers,
            desired_cube_size,
        }
    }

    /// Number of indexed dimensions.
    #[inline]
    pub fn dims(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_staging(&self) -> bool {
        self.id == STAGING_REVISION_ID
    }

    /// Project a row's indexed values into the normalized key space.
    ///
    /// Returns the point and whether any coordinate fell outside its
    /// transformer's fitted domain (which flags a revision upgrade).
    pub fn project(&self, indexed_values: &[Value]) -> (Point, bool) {
        debug_assert_eq!(indexed_values.len(), self.transformers.len());
        let mut coords = Vec::with_capacity(self.transformers.len());
        let mut out_of_domain = false;
        for (value, transformer) in indexed_values.iter().zip(self.transformers.iter()) {
            let projection = transformer.transform(value);
            out_of_domain |= projection.out_of_domain;
            coords.push(projection.value);
        }
        (Point(coords), out_of_domain)
    }

    /// Build the successor revision needed to cover `fitted`, or `None` when
    /// the current transformers already supersede it.
    pub fn widened(&self, fitted: &[Transformer], timestamp_ms: i64) -> Option<Revision> {
        debug_assert_eq!(fitted.len(), self.transformers.len());
        let needs_upgrade = self
            .transformers
            .iter()
            .zip(fitted.iter())
            .any(|(current, f)| !current.supersedes(f));
        if !needs_upgrade {
            return None;
        }
        let transformers = self
            .transformers
            .iter()
            .zip(fitted.iter())
            .map(|(current, f)| current.merge(f))
            .collect();
        Some(Revision {
            id: self.id + 1,
            timestamp_ms,
            columns: self.columns.clone(),
            transformers,
            desired_cube_size: self.desired_cube_size,
        })
    }
}

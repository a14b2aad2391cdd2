//! Revision fitting: decide whether a batch needs a wider revision.
//!
//! Before indexing, the write pipeline fits per-column statistics over the
//! incoming batch. If any indexed value falls outside the active revision's
//! transformer domains, the merge of the two produces the successor revision
//! that the commit installs atomically alongside the batch's files.

use otree_db_core::{ColumnBatch, ColumnStats, Revision, Transformer};

use crate::error::Result;

/// Fit transformers to the batch's indexed columns.
pub fn fit_transformers(batch: &ColumnBatch, columns: &[String]) -> Result<Vec<Transformer>> {
    let indices = batch.schema().project(columns)?;
    let mut stats: Vec<ColumnStats> = indices.iter().map(|_| ColumnStats::new()).collect();
    for row in 0..batch.num_rows() {
        for (stat, &col) in stats.iter_mut().zip(indices.iter()) {
            stat.observe(&batch.column(col).value(row));
        }
    }
    Ok(stats.iter().map(ColumnStats::fit).collect())
}

/// The revision this batch must be written under.
///
/// Returns `Some(next)` when the active revision's transformers do not cover
/// the batch (including the first real write over the staging revision),
/// `None` when the active revision already supersedes the fitted one.
pub fn fit_revision(
    batch: &ColumnBatch,
    revision: &Revision,
    now_ms: i64,
) -> Result<Option<Revision>> {
    let fitted = fit_transformers(batch, &revision.columns)?;
    let next = revision.widened(&fitted, now_ms);
    if let Some(ref next) = next {
        tracing::info!(
            from = revision.id,
            to = next.id,
            "transformer domains widened, revision upgrade required"
        );
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use otree_db_core::batch::{BatchSchema, FieldInfo, FieldType};
    use otree_db_core::Value;
    use std::sync::Arc;

    fn batch(values: &[i64]) -> ColumnBatch {
        let schema = Arc::new(
            BatchSchema::new(vec![FieldInfo::new("x", FieldType::Int64, false)]).unwrap(),
        );
        let mut batch = ColumnBatch::empty(schema);
        for &v in values {
            batch.push_row(vec![Value::Int64(v)]).unwrap();
        }
        batch
    }

    #[test]
    fn test_first_write_upgrades_staging() {
        let staging = Revision::staging(vec!["x".to_string()], 100, 0);
        let next = fit_revision(&batch(&[1, 5, 9]), &staging, 1_000)
            .unwrap()
            .expect("staging must upgrade");
        assert_eq!(next.id, 1);
        assert_eq!(
            next.transformers,
            vec![Transformer::Linear { min: 1.0, max: 9.0 }]
        );
    }

    #[test]
    fn test_covered_batch_keeps_revision() {
        let revision = Revision {
            id: 1,
            timestamp_ms: 0,
            columns: vec!["x".to_string()],
            transformers: vec![Transformer::Linear {
                min: 0.0,
                max: 100.0,
            }],
            desired_cube_size: 100,
        };
        assert!(fit_revision(&batch(&[5, 50, 99]), &revision, 1_000)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_out_of_range_batch_widens() {
        let revision = Revision {
            id: 1,
            timestamp_ms: 0,
            columns: vec!["x".to_string()],
            transformers: vec![Transformer::Linear {
                min: 0.0,
                max: 100.0,
            }],
            desired_cube_size: 100,
        };
        let next = fit_revision(&batch(&[5, 500]), &revision, 1_000)
            .unwrap()
            .expect("must widen");
        assert_eq!(next.id, 2);
        assert_eq!(
            next.transformers,
            vec![Transformer::Linear {
                min: 0.0,
                max: 500.0
            }]
        );
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let staging = Revision::staging(vec!["missing".to_string()], 100, 0);
        assert!(fit_revision(&batch(&[1]), &staging, 0).is_err());
    }
}

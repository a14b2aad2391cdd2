//! The block writer: pack indexed rows into one output file per cube.
//!
//! One writer serves one partition. Rows are written clean - weights and
//! cube assignments live only in the file tags, never as data columns - and
//! every block gets a fresh uuid name, which is what makes a retried
//! partition idempotent: abandoned files from a failed attempt are never
//! referenced by a commit and fall to the external garbage collector.

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use otree_db_core::{BatchSchema, BlockTags, ColumnBatch};
use otree_db_index::CubeGroup;
use otree_db_log::AddFile;

use crate::error::Result;
use crate::format::BlockFormat;

/// Directory for data files inside a table directory.
pub const DATA_DIR_NAME: &str = "data";

/// Per-partition block writer.
#[derive(Debug)]
pub struct BlockWriter<'a> {
    format: &'a dyn BlockFormat,
    table_root: &'a Path,
}

impl<'a> BlockWriter<'a> {
    pub fn new(format: &'a dyn BlockFormat, table_root: &'a Path) -> Self {
        Self { format, table_root }
    }

    /// Write one block per cube group and return their AddFile records.
    ///
    /// Any error aborts the partition: no records are returned and files
    /// already written are left for the external garbage collector (nothing
    /// will reference them).
    pub async fn write_groups(
        &self,
        batch: &ColumnBatch,
        schema: &Arc<BatchSchema>,
        groups: &[CubeGroup],
        revision_id: u64,
    ) -> Result<Vec<AddFile>> {
        let mut records = Vec::with_capacity(groups.len());
        for group in groups {
            let relative = format!(
                "{}/{}.{}",
                DATA_DIR_NAME,
                Uuid::new_v4(),
                self.format.extension()
            );
            let path = self.table_root.join(&relative);
            let mut writer = self.format.open_writer(&path, schema.clone()).await?;
            for &row in &group.rows {
                writer.write_row(&batch.row(row)).await?;
            }
            let stats = writer.close().await?;

            tracing::debug!(
                cube = %group.cube,
                rows = group.rows.len(),
                bytes = stats.size,
                path = %relative,
                "block written"
            );

            records.push(AddFile {
                path: relative,
                size: stats.size,
                modification_time: stats.modification_time,
                tags: BlockTags {
                    cube: group.cube.clone(),
                    min_weight: group.min_weight,
                    max_weight: group.max_weight,
                    state: group.state,
                    revision_id,
                    element_count: group.rows.len() as u64,
                },
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::JsonBlockFormat;
    use otree_db_core::batch::{FieldInfo, FieldType};
    use otree_db_core::{CubeId, CubeState, Value, Weight, MAX_WEIGHT};

    fn schema() -> Arc<BatchSchema> {
        Arc::new(
            BatchSchema::new(vec![FieldInfo::new("x", FieldType::Int64, false)]).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_write_groups_emits_tagged_records() {
        let dir = tempfile::tempdir().unwrap();
        let format = JsonBlockFormat;
        let writer = BlockWriter::new(&format, dir.path());

        let schema = schema();
        let mut batch = ColumnBatch::empty(schema.clone());
        for i in 0..10 {
            batch.push_row(vec![Value::Int64(i)]).unwrap();
        }

        let groups = vec![
            CubeGroup {
                cube: CubeId::root(1),
                rows: vec![0, 1, 2, 3],
                min_weight: Weight(-100),
                max_weight: Weight(50),
                state: CubeState::Flooded,
            },
            CubeGroup {
                cube: CubeId::root(1).child(1),
                rows: vec![4, 5, 6, 7, 8, 9],
                min_weight: Weight(50),
                max_weight: MAX_WEIGHT,
                state: CubeState::Flooded,
            },
        ];

        let records = writer
            .write_groups(&batch, &schema, &groups, 1)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tags.element_count, 4);
        assert_eq!(records[1].tags.element_count, 6);
        assert_ne!(records[0].path, records[1].path);

        // Blocks hold exactly their group's rows
        let block = format
            .read_batch(&dir.path().join(&records[1].path), schema)
            .await
            .unwrap();
        assert_eq!(block.num_rows(), 6);
        assert_eq!(block.row(0), vec![Value::Int64(4)]);
    }

    #[tokio::test]
    async fn test_retry_uses_fresh_names() {
        let dir = tempfile::tempdir().unwrap();
        let format = JsonBlockFormat;
        let writer = BlockWriter::new(&format, dir.path());

        let schema = schema();
        let mut batch = ColumnBatch::empty(schema.clone());
        batch.push_row(vec![Value::Int64(1)]).unwrap();
        let groups = vec![CubeGroup {
            cube: CubeId::root(1),
            rows: vec![0],
            min_weight: Weight(0),
            max_weight: MAX_WEIGHT,
            state: CubeState::Flooded,
        }];

        let first = writer
            .write_groups(&batch, &schema, &groups, 1)
            .await
            .unwrap();
        let second = writer
            .write_groups(&batch, &schema, &groups, 1)
            .await
            .unwrap();
        assert_ne!(first[0].path, second[0].path);
    }
}

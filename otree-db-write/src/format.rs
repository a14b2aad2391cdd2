//! The columnar-file seam: how blocks reach disk.
//!
//! The engine writes one immutable file per cube per partition through the
//! [`BlockFormat`] trait and never looks inside a file on the scan path
//! except through [`BlockFormat::read_batch`]. Production embeddings plug in
//! their real columnar writer here; [`JsonBlockFormat`] is the built-in
//! reference format (one JSON row array per line) used by the tests and the
//! table facade.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use otree_db_core::{BatchSchema, ColumnBatch, Value};

use crate::error::{Result, WriteError};

/// Filesystem facts about a closed block, read back after the last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    /// File length in bytes.
    pub size: u64,
    /// Modification time (ms since epoch).
    pub modification_time: i64,
}

/// An open row sink for one block.
#[async_trait]
pub trait BlockRowWriter: Send {
    /// Append one row, in schema order.
    async fn write_row(&mut self, row: &[Value]) -> Result<()>;

    /// Flush, close, and stat the finished file.
    async fn close(self: Box<Self>) -> Result<FileStats>;
}

/// A pluggable block file format.
#[async_trait]
pub trait BlockFormat: Debug + Send + Sync {
    /// Open a row sink at `path`, creating parent directories.
    async fn open_writer(
        &self,
        path: &Path,
        schema: Arc<BatchSchema>,
    ) -> Result<Box<dyn BlockRowWriter>>;

    /// Read a whole block back as a batch.
    async fn read_batch(&self, path: &Path, schema: Arc<BatchSchema>) -> Result<ColumnBatch>;

    /// File extension for blocks in this format, without the dot.
    fn extension(&self) -> &'static str;
}

/// Reference format: newline-delimited JSON row arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBlockFormat;

struct JsonBlockWriter {
    writer: BufWriter<tokio::fs::File>,
    path: std::path::PathBuf,
}

#[async_trait]
impl BlockRowWriter for JsonBlockWriter {
    async fn write_row(&mut self, row: &[Value]) -> Result<()> {
        let json: Vec<serde_json::Value> = row.iter().map(Value::to_json).collect();
        let mut line = serde_json::to_vec(&json)
            .map_err(|e| WriteError::writer_io(format!("encode row: {}", e)))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<FileStats> {
        self.writer.flush().await?;
        let file = self.writer.into_inner();
        file.sync_all().await?;
        drop(file);

        let meta = tokio::fs::metadata(&self.path).await?;
        let modification_time = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok(FileStats {
            size: meta.len(),
            modification_time,
        })
    }
}

#[async_trait]
impl BlockFormat for JsonBlockFormat {
    async fn open_writer(
        &self,
        path: &Path,
        _schema: Arc<BatchSchema>,
    ) -> Result<Box<dyn BlockRowWriter>> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(path).await?;
        Ok(Box::new(JsonBlockWriter {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        }))
    }

    async fn read_batch(&self, path: &Path, schema: Arc<BatchSchema>) -> Result<ColumnBatch> {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut batch = ColumnBatch::empty(schema.clone());
        while let Some(line) = lines.next_line().await? {
            if line.is_empty() {
                continue;
            }
            let json: Vec<serde_json::Value> = serde_json::from_str(&line)
                .map_err(|e| WriteError::corrupt_block(path.display().to_string(), e.to_string()))?;
            if json.len() != schema.num_fields() {
                return Err(WriteError::corrupt_block(
                    path.display().to_string(),
                    format!(
                        "row arity {} does not match schema arity {}",
                        json.len(),
                        schema.num_fields()
                    ),
                ));
            }
            let row: Vec<Value> = json
                .iter()
                .zip(schema.fields.iter())
                .map(|(j, f)| Value::from_json(f.field_type, j))
                .collect::<otree_db_core::Result<_>>()?;
            batch.push_row(row)?;
        }
        Ok(batch)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otree_db_core::batch::{FieldInfo, FieldType};

    fn schema() -> Arc<BatchSchema> {
        Arc::new(
            BatchSchema::new(vec![
                FieldInfo::new("id", FieldType::Int64, false),
                FieldInfo::new("name", FieldType::String, true),
            ])
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/block.json");
        let format = JsonBlockFormat;

        let mut writer = format.open_writer(&path, schema()).await.unwrap();
        writer
            .write_row(&[Value::Int64(1), Value::String("a".to_string())])
            .await
            .unwrap();
        writer.write_row(&[Value::Int64(2), Value::Null]).await.unwrap();
        let stats = writer.close().await.unwrap();
        assert!(stats.size > 0);
        assert!(stats.modification_time > 0);

        let batch = format.read_batch(&path, schema()).await.unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(
            batch.row(0),
            vec![Value::Int64(1), Value::String("a".to_string())]
        );
        assert_eq!(batch.row(1), vec![Value::Int64(2), Value::Null]);
    }

    #[tokio::test]
    async fn test_read_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"[1]\n").await.unwrap();
        let err = JsonBlockFormat
            .read_batch(&path, schema())
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::CorruptBlock { .. }));
    }
}

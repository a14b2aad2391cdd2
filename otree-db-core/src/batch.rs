//! Columnar batch format for tabular data.
//!
//! Data is stored in typed `Vec`s per column with schema information, which
//! keeps filtering and weight computation cheap without pulling in an Arrow
//! dependency. Column names are the canonical identifier: the write options
//! (`columnsToIndex`) and the revision both address columns by name.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::value::Value;

/// Tabular field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    /// Days since 1970-01-01
    Date,
    /// Microseconds since epoch (UTC)
    Timestamp,
}

/// Field information for a column in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldInfo {
    /// Column name - canonical identifier for lookups.
    pub name: String,
    /// Field type.
    pub field_type: FieldType,
    /// Whether the field allows nulls.
    pub nullable: bool,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, field_type: FieldType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable,
        }
    }
}

/// Schema for a column batch.
#[derive(Debug, Clone)]
pub struct BatchSchema {
    /// Field definitions in column order.
    pub fields: Vec<FieldInfo>,
    /// Canonical lookup by name.
    name_to_index: HashMap<String, usize>,
}

impl BatchSchema {
    /// Create a new batch schema from field definitions.
    ///
    /// Returns a schema error if two fields share a name.
    pub fn new(fields: Vec<FieldInfo>) -> Result<Self> {
        let mut name_to_index = HashMap::with_capacity(fields.len());
        for (i, f) in fields.iter().enumerate() {
            if name_to_index.insert(f.name.clone(), i).is_some() {
                return Err(CoreError::schema(format!("duplicate column name: {}", f.name)));
            }
        }
        Ok(Self {
            fields,
            name_to_index,
        })
    }

    /// Get field index by name (canonical).
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get field info by name.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    /// Number of fields in the schema.
    #[inline]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Resolve a list of column names to column indices.
    ///
    /// Returns `MissingIndexedColumn` for the first name that does not
    /// resolve - an unresolvable indexed column is fatal to the write.
    pub fn project(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                self.index_of(n)
                    .ok_or_else(|| CoreError::missing_column(n.clone()))
            })
            .collect()
    }
}

/// Column storage - typed arrays with optional values (nullable).
#[derive(Debug, Clone)]
pub enum Column {
    Boolean(Vec<Option<bool>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Date(Vec<Option<i32>>),
    Timestamp(Vec<Option<i64>>),
}

impl Column {
    /// Create an empty column of the given type.
    pub fn empty(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Boolean => Self::Boolean(Vec::new()),
            FieldType::Int32 => Self::Int32(Vec::new()),
            FieldType::Int64 => Self::Int64(Vec::new()),
            FieldType::Float32 => Self::Float32(Vec::new()),
            FieldType::Float64 => Self::Float64(Vec::new()),
            FieldType::String => Self::String(Vec::new()),
            FieldType::Date => Self::Date(Vec::new()),
            FieldType::Timestamp => Self::Timestamp(Vec::new()),
        }
    }

    /// Get the number of rows in this column.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Date(v) => v.len(),
            Self::Timestamp(v) => v.len(),
        }
    }

    /// Check if the column is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the value at `row` is null.
    pub fn is_null(&self, row: usize) -> bool {
        match self {
            Self::Boolean(v) => v.get(row).map_or(true, Option::is_none),
            Self::Int32(v) => v.get(row).map_or(true, Option::is_none),
            Self::Int64(v) => v.get(row).map_or(true, Option::is_none),
            Self::Float32(v) => v.get(row).map_or(true, Option::is_none),
            Self::Float64(v) => v.get(row).map_or(true, Option::is_none),
            Self::String(v) => v.get(row).map_or(true, Option::is_none),
            Self::Date(v) => v.get(row).map_or(true, Option::is_none),
            Self::Timestamp(v) => v.get(row).map_or(true, Option::is_none),
        }
    }

    /// Read the value at `row`.
    pub fn value(&self, row: usize) -> Value {
        match self {
            Self::Boolean(v) => v[row].map(Value::Boolean).unwrap_or(Value::Null),
            Self::Int32(v) => v[row].map(Value::Int32).unwrap_or(Value::Null),
            Self::Int64(v) => v[row].map(Value::Int64).unwrap_or(Value::Null),
            Self::Float32(v) => v[row].map(Value::Float32).unwrap_or(Value::Null),
            Self::Float64(v) => v[row].map(Value::Float64).unwrap_or(Value::Null),
            Self::String(v) => v[row]
                .as_ref()
                .map(|s| Value::String(s.clone()))
                .unwrap_or(Value::Null),
            Self::Date(v) => v[row].map(Value::Date).unwrap_or(Value::Null),
            Self::Timestamp(v) => v[row].map(Value::Timestamp).unwrap_or(Value::Null),
        }
    }

    /// Append a value. The value must match the column type (or be null).
    pub fn push(&mut self, value: Value) -> Result<()> {
        match (self, value) {
            (Self::Boolean(v), Value::Boolean(b)) => v.push(Some(b)),
            (Self::Boolean(v), Value::Null) => v.push(None),
            (Self::Int32(v), Value::Int32(i)) => v.push(Some(i)),
            (Self::Int32(v), Value::Null) => v.push(None),
            (Self::Int64(v), Value::Int64(i)) => v.push(Some(i)),
            (Self::Int64(v), Value::Null) => v.push(None),
            (Self::Float32(v), Value::Float32(f)) => v.push(Some(f)),
            (Self::Float32(v), Value::Null) => v.push(None),
            (Self::Float64(v), Value::Float64(f)) => v.push(Some(f)),
            (Self::Float64(v), Value::Null) => v.push(None),
            (Self::String(v), Value::String(s)) => v.push(Some(s)),
            (Self::String(v), Value::Null) => v.push(None),
            (Self::Date(v), Value::Date(d)) => v.push(Some(d)),
            (Self::Date(v), Value::Null) => v.push(None),
            (Self::Timestamp(v), Value::Timestamp(t)) => v.push(Some(t)),
            (Self::Timestamp(v), Value::Null) => v.push(None),
            (_, value) => {
                return Err(CoreError::schema(format!(
                    "value kind {:?} does not match column type",
                    value.kind()
                )))
            }
        }
        Ok(())
    }
}

/// A batch of rows in columnar layout.
#[derive(Debug, Clone)]
pub struct ColumnBatch {
    schema: Arc<BatchSchema>,
    columns: Vec<Column>,
    num_rows: usize,
}

impl ColumnBatch {
    /// Create a batch from pre-built columns.
    ///
    /// All columns must have the same length and match the schema order.
    pub fn new(schema: Arc<BatchSchema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.num_fields() {
            return Err(CoreError::schema(format!(
                "expected {} columns, got {}",
                schema.num_fields(),
                columns.len()
            )));
        }
        let num_rows = columns.first().map_or(0, Column::len);
        for (i, col) in columns.iter().enumerate() {
            if col.len() != num_rows {
                return Err(CoreError::schema(format!(
                    "ragged batch: column {} has {} rows, expected {}",
                    schema.fields[i].name,
                    col.len(),
                    num_rows
                )));
            }
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    /// Create an empty batch for the given schema.
    pub fn empty(schema: Arc<BatchSchema>) -> Self {
        let columns = schema
            .fields
            .iter()
            .map(|f| Column::empty(f.field_type))
            .collect();
        Self {
            schema,
            columns,
            num_rows: 0,
        }
    }

    #[inline]
    pub fn schema(&self) -> &Arc<BatchSchema> {
        &self.schema
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Column by position.
    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    /// Append a full row of values in schema order.
    ///
    /// A malformed row (wrong arity, type mismatch, null in a non-nullable
    /// column) fails the whole batch; per-row recovery is not supported.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.schema.num_fields() {
            return Err(CoreError::schema(format!(
                "row arity {} does not match schema arity {}",
                row.len(),
                self.schema.num_fields()
            )));
        }
        for (value, field) in row.iter().zip(self.schema.fields.iter()) {
            if matches!(value, Value::Null) && !field.nullable {
                return Err(CoreError::schema(format!(
                    "null in non-nullable column {}",
                    field.name
                )));
            }
            if !value.matches_type(field.field_type) {
                return Err(CoreError::schema(format!(
                    "value kind {:?} does not match column {} ({:?})",
                    value.kind(),
                    field.name,
                    field.field_type
                )));
            }
        }
        for (col, value) in self.columns.iter_mut().zip(row) {
            col.push(value)?;
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Materialize a full row in schema order.
    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.value(index)).collect()
    }

    /// Materialize the values of selected columns for one row.
    pub fn values_at(&self, row: usize, column_indices: &[usize]) -> Vec<Value> {
        column_indices
            .iter()
            .map(|&i| self.columns[i].value(row))
            .collect()
    }

    /// Append all rows of another batch. Schemas must agree field-for-field.
    pub fn extend(&mut self, other: &ColumnBatch) -> Result<()> {
        if self.schema.fields != other.schema.fields {
            return Err(CoreError::schema(
                "cannot extend batch with mismatched schema",
            ));
        }
        for i in 0..other.num_rows {
            self.push_row(other.row(i))?;
        }
        Ok(())
    }

    /// Rough in-memory footprint, used for staging-size accounting.
    pub fn estimated_bytes(&self) -> usize {
        let mut total = 0usize;
        for i in 0..self.num_rows {
            for col in &self.columns {
                total += col.value(i).estimated_bytes();
            }
        }
        total
    }
}

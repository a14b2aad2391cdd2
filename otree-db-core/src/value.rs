//! Scalar values and their stable byte encodings.
//!
//! `Value` is the row-oriented scalar type used when appending to and reading
//! from a [`crate::batch::ColumnBatch`]. Two encodings matter here:
//!
//! - **Stable bytes**: the canonical byte form fed to the weight hash. It is
//!   domain-separated by a per-kind tag so `Int32(3)` and `Int64(3)` never
//!   collide, and it must never change once data has been written.
//! - **JSON**: the interchange form used by the reference block format. JSON
//!   is lossy about integer widths, so decoding is schema-driven.

use crate::batch::FieldType;
use crate::error::{CoreError, Result};

/// A single scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    /// Days since 1970-01-01
    Date(i32),
    /// Microseconds since epoch (UTC)
    Timestamp(i64),
}

// Stable-encoding kind tags. Frozen: changing any of these changes every
// weight ever computed.
const TAG_NULL: u8 = 0;
const TAG_BOOLEAN: u8 = 1;
const TAG_INT32: u8 = 2;
const TAG_INT64: u8 = 3;
const TAG_FLOAT32: u8 = 4;
const TAG_FLOAT64: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_DATE: u8 = 7;
const TAG_TIMESTAMP: u8 = 8;

impl Value {
    /// The field type this value inhabits, or `None` for null.
    pub fn kind(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::Int32(_) => Some(FieldType::Int32),
            Value::Int64(_) => Some(FieldType::Int64),
            Value::Float32(_) => Some(FieldType::Float32),
            Value::Float64(_) => Some(FieldType::Float64),
            Value::String(_) => Some(FieldType::String),
            Value::Date(_) => Some(FieldType::Date),
            Value::Timestamp(_) => Some(FieldType::Timestamp),
        }
    }

    /// Check whether this value can be stored in a column of `field_type`.
    pub fn matches_type(&self, field_type: FieldType) -> bool {
        match self.kind() {
            None => true, // nulls fit any nullable column; nullability is checked by the batch
            Some(k) => k == field_type,
        }
    }

    /// Numeric projection used by linear transformers.
    ///
    /// Temporal types project through their integer representation; booleans
    /// through 0/1. Strings and nulls have no linear projection.
    pub fn as_f64_projection(&self) -> Option<f64> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Date(v) => Some(*v as f64),
            Value::Timestamp(v) => Some(*v as f64),
            Value::Null | Value::String(_) => None,
        }
    }

    /// Append the stable byte encoding of this value to `buf`.
    ///
    /// Little-endian, tag-prefixed, length-prefixed for strings. Identical
    /// values always produce identical bytes; distinct kinds never collide.
    pub fn write_stable_bytes(&self, buf: &mut Vec<u8>) {
        match self {
            Value::Null => buf.push(TAG_NULL),
            Value::Boolean(b) => {
                buf.push(TAG_BOOLEAN);
                buf.push(*b as u8);
            }
            Value::Int32(v) => {
                buf.push(TAG_INT32);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Int64(v) => {
                buf.push(TAG_INT64);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Float32(v) => {
                buf.push(TAG_FLOAT32);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Value::Float64(v) => {
                buf.push(TAG_FLOAT64);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Value::String(s) => {
                buf.push(TAG_STRING);
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            Value::Date(v) => {
                buf.push(TAG_DATE);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Timestamp(v) => {
                buf.push(TAG_TIMESTAMP);
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Rough in-memory footprint, used for staging-size accounting.
    pub fn estimated_bytes(&self) -> usize {
        match self {
            Value::Null => 1,
            Value::Boolean(_) => 1,
            Value::Int32(_) | Value::Float32(_) | Value::Date(_) => 4,
            Value::Int64(_) | Value::Float64(_) | Value::Timestamp(_) => 8,
            Value::String(s) => s.len() + 8,
        }
    }

    /// Convert to the JSON interchange form used by the reference block format.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Int32(v) => serde_json::Value::from(*v),
            Value::Int64(v) => serde_json::Value::from(*v),
            Value::Float32(v) => serde_json::Value::from(*v as f64),
            Value::Float64(v) => serde_json::Value::from(*v),
            Value::String(s) => serde_json::Value::from(s.clone()),
            Value::Date(v) => serde_json::Value::from(*v),
            Value::Timestamp(v) => serde_json::Value::from(*v),
        }
    }

    /// Decode from JSON with the column type supplying the integer width.
    pub fn from_json(field_type: FieldType, json: &serde_json::Value) -> Result<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        let mismatch = || {
            CoreError::schema(format!(
                "JSON value {} does not fit column type {:?}",
                json, field_type
            ))
        };
        match field_type {
            FieldType::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(mismatch),
            FieldType::Int32 => json
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int32)
                .ok_or_else(mismatch),
            FieldType::Int64 => json.as_i64().map(Value::Int64).ok_or_else(mismatch),
            FieldType::Float32 => json
                .as_f64()
                .map(|v| Value::Float32(v as f32))
                .ok_or_else(mismatch),
            FieldType::Float64 => json.as_f64().map(Value::Float64).ok_or_else(mismatch),
            FieldType::String => json
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(mismatch),
            FieldType::Date => json
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Date)
                .ok_or_else(mismatch),
            FieldType::Timestamp => json.as_i64().map(Value::Timestamp).ok_or_else(mismatch),
        }
    }
}

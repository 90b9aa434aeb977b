//! Row-level data model shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One logical row flowing through the pipeline.
///
/// `original_index` is assigned once on ingest, globally across batches,
/// and is never reused or reordered. Chunks produced from a long document
/// inherit their parent's index. All non-text columns ride along in
/// `extra` untouched and are reproduced verbatim on output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Position of the source row in the input stream (0-based).
    pub original_index: u64,
    /// The text payload under the caller-chosen column.
    pub text: String,
    /// Passthrough fields preserved to output.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Create a record with no passthrough fields.
    pub fn new(original_index: u64, text: impl Into<String>) -> Self {
        Self {
            original_index,
            text: text.into(),
            extra: Map::new(),
        }
    }

    /// Text length in Unicode scalar values (never bytes).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Serialize to the output NDJSON object: passthrough fields plus the
    /// text column under `text_column`. `original_index` is internal and
    /// does not appear in the output.
    pub fn to_output_json(&self, text_column: &str) -> Value {
        let mut obj = self.extra.clone();
        obj.insert(text_column.to_string(), Value::String(self.text.clone()));
        Value::Object(obj)
    }
}

/// An ordered slice of records, at most `batch_size` long.
pub type RecordBatch = Vec<Record>;

/// A raw row as produced by a reader, before the text column is resolved.
///
/// Values are kept as JSON so CSV, NDJSON, and plugged-in formats share one
/// shape; the hot loops downstream only ever touch [`Record`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub values: Map<String, Value>,
}

impl RawRow {
    /// Column names present on this row.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Coarse column type observed while probing a sample of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Null,
    Other,
}

impl ColumnType {
    /// Classify a single JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Float,
            Value::Bool(_) => Self::Boolean,
            Value::Null => Self::Null,
            _ => Self::Other,
        }
    }

    /// Merge two observations of the same column. `Null` defers to the
    /// other side; conflicting concrete types degrade to `Other`.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Null, b) => b,
            (a, Self::Null) => a,
            (Self::Integer, Self::Float) | (Self::Float, Self::Integer) => Self::Float,
            _ => Self::Other,
        }
    }
}

/// Name/type pair discovered by the schema probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub ty: ColumnType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn char_len_counts_scalars_not_bytes() {
        let r = Record::new(0, "café");
        assert_eq!(r.char_len(), 4);
        assert_eq!(r.text.len(), 5);
    }

    #[test]
    fn output_json_preserves_passthrough() {
        let mut r = Record::new(3, "hello");
        r.extra.insert("id".into(), json!(42));
        let out = r.to_output_json("text");
        assert_eq!(out["id"], json!(42));
        assert_eq!(out["text"], json!("hello"));
        assert!(out.get("original_index").is_none());
    }

    #[test]
    fn column_type_merge_degrades() {
        assert_eq!(ColumnType::String.merge(ColumnType::Null), ColumnType::String);
        assert_eq!(ColumnType::Integer.merge(ColumnType::Float), ColumnType::Float);
        assert_eq!(ColumnType::String.merge(ColumnType::Integer), ColumnType::Other);
    }
}

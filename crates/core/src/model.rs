//! Wire-shaped record model for the platform's record API.
//!
//! Every field value travels as `{"value": <V>}`; nested tables travel as
//! `{"value": [{"id"?: .., "value": {..}}]}`. Numeric values arrive as
//! strings, so numeric access goes through [`FieldValue::as_int`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric identifier of a form/app on the platform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u64);

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Store-assigned numeric identifier of a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// The fields of one record, keyed by field code.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One row of a nested table field.
///
/// `id` is the store-assigned row identifier; it is `None` on rows built
/// locally that have not been persisted yet, and required when updating an
/// existing row in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: FieldMap,
}

impl TableRow {
    pub fn new(value: FieldMap) -> Self {
        Self { id: None, value }
    }
}

/// A single field value in the platform's wire shape.
///
/// The table variant is tried first during deserialization; anything whose
/// `value` is not an array of row objects falls through to the scalar variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Table { value: Vec<TableRow> },
    Scalar { value: serde_json::Value },
}

impl FieldValue {
    /// Scalar text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar {
            value: serde_json::Value::String(value.into()),
        }
    }

    /// Scalar numeric value. The platform serializes numbers as strings.
    pub fn number(value: i64) -> Self {
        Self::Scalar {
            value: serde_json::Value::String(value.to_string()),
        }
    }

    pub fn table(rows: Vec<TableRow>) -> Self {
        Self::Table { value: rows }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar { value } => value.as_str(),
            Self::Table { .. } => None,
        }
    }

    /// Numeric view of the value, accepting both JSON numbers and the
    /// platform's string-encoded numbers.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Scalar { value } => match value {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            },
            Self::Table { .. } => None,
        }
    }

    pub fn as_table(&self) -> Option<&[TableRow]> {
        match self {
            Self::Table { value } => Some(value),
            Self::Scalar { .. } => None,
        }
    }

    /// True for values the projector must not emit: JSON null, empty or
    /// whitespace-only strings, and empty tables.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar { value } => match value {
                serde_json::Value::Null => true,
                serde_json::Value::String(s) => s.trim().is_empty(),
                serde_json::Value::Array(items) => items.is_empty(),
                _ => false,
            },
            Self::Table { value } => value.is_empty(),
        }
    }
}

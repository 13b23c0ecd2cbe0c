//! Declarative field projection from a source record into a target payload.
//!
//! Earlier revisions of this customization carried near-duplicate copies of
//! the payload-building code per form variant; the manifest replaces them
//! with an ordinary list of source-to-target mappings plus an optional
//! single-row table projection.

use serde::{Deserialize, Serialize};

use crate::model::{FieldMap, FieldValue, TableRow};

/// Where a projected value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// A single source field code.
    Key(String),
    /// The first of these source field codes carrying a non-empty value.
    FirstNonEmpty(Vec<String>),
}

/// One source-to-target field mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source: FieldSource,
    pub target: String,
}

impl FieldMapping {
    /// Map a field onto the same code in the target record.
    pub fn direct(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            source: FieldSource::Key(code.clone()),
            target: code,
        }
    }

    pub fn renamed(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: FieldSource::Key(source.into()),
            target: target.into(),
        }
    }

    pub fn first_non_empty(
        sources: impl IntoIterator<Item = String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: FieldSource::FirstNonEmpty(sources.into_iter().collect()),
            target: target.into(),
        }
    }

    fn resolve<'a>(&self, record: &'a FieldMap) -> Option<&'a FieldValue> {
        let lookup = |key: &str| record.get(key).filter(|value| !value.is_empty());
        match &self.source {
            FieldSource::Key(key) => lookup(key.as_str()),
            FieldSource::FirstNonEmpty(keys) => keys.iter().find_map(|key| lookup(key.as_str())),
        }
    }
}

/// Table-bound mappings, emitted as a single new row under `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProjection {
    pub target: String,
    pub fields: Vec<FieldMapping>,
}

/// The full projection manifest for one workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionManifest {
    pub fields: Vec<FieldMapping>,
    pub table: Option<TableProjection>,
}

impl ProjectionManifest {
    /// Project the configured subset of fields out of `record`.
    ///
    /// The result is sparse: absent and empty source values produce no entry,
    /// and the nested table is omitted entirely when no table-bound field
    /// qualifies.
    pub fn project(&self, record: &FieldMap) -> FieldMap {
        let mut payload = FieldMap::new();
        for mapping in &self.fields {
            if let Some(value) = mapping.resolve(record) {
                payload.insert(mapping.target.clone(), value.clone());
            }
        }
        if let Some(table) = &self.table {
            let row = self.table_row(record);
            if !row.is_empty() {
                payload.insert(
                    table.target.clone(),
                    FieldValue::table(vec![TableRow::new(row)]),
                );
            }
        }
        payload
    }

    /// Project only the table-bound fields, as the flat field map of one row.
    /// Used for the seed row at creation and for history merges on later saves.
    pub fn table_row(&self, record: &FieldMap) -> FieldMap {
        let mut row = FieldMap::new();
        if let Some(table) = &self.table {
            for mapping in &table.fields {
                if let Some(value) = mapping.resolve(record) {
                    row.insert(mapping.target.clone(), value.clone());
                }
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> ProjectionManifest {
        ProjectionManifest {
            fields: vec![
                FieldMapping::direct("name"),
                FieldMapping::renamed("postal", "zip"),
                FieldMapping::first_non_empty(
                    vec!["shipping_address".to_string(), "address".to_string()],
                    "address",
                ),
            ],
            table: Some(TableProjection {
                target: "purchase_history".to_string(),
                fields: vec![
                    FieldMapping::direct("product"),
                    FieldMapping::direct("amount"),
                ],
            }),
        }
    }

    fn record(entries: &[(&str, &str)]) -> FieldMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::text(*v)))
            .collect()
    }

    #[test]
    fn projects_present_fields_and_skips_empty_ones() {
        let source = record(&[("name", "Aoki"), ("postal", "150-0001"), ("address", "")]);
        let payload = manifest().project(&source);

        assert_eq!(
            payload.get("name").and_then(FieldValue::as_text),
            Some("Aoki")
        );
        assert_eq!(
            payload.get("zip").and_then(FieldValue::as_text),
            Some("150-0001")
        );
        // "address" was empty and "shipping_address" absent: no entry at all.
        assert!(!payload.contains_key("address"));
    }

    #[test]
    fn fallback_chain_takes_first_non_empty_source() {
        let source = record(&[("shipping_address", ""), ("address", "1-2-3 Ebisu")]);
        let payload = manifest().project(&source);
        assert_eq!(
            payload.get("address").and_then(FieldValue::as_text),
            Some("1-2-3 Ebisu")
        );

        let source = record(&[("shipping_address", "4-5 Kanda"), ("address", "1-2-3 Ebisu")]);
        let payload = manifest().project(&source);
        assert_eq!(
            payload.get("address").and_then(FieldValue::as_text),
            Some("4-5 Kanda")
        );
    }

    #[test]
    fn table_projection_emits_single_new_row() {
        let source = record(&[("product", "widget"), ("amount", "1200")]);
        let payload = manifest().project(&source);

        let rows = payload
            .get("purchase_history")
            .and_then(FieldValue::as_table)
            .expect("table entry");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, None);
        assert_eq!(
            rows[0].value.get("product").and_then(FieldValue::as_text),
            Some("widget")
        );
        assert_eq!(rows[0].value.get("amount").and_then(FieldValue::as_int), Some(1200));
    }

    #[test]
    fn table_is_omitted_when_no_bound_field_has_a_value() {
        let source = record(&[("name", "Aoki"), ("product", "")]);
        let payload = manifest().project(&source);
        assert!(!payload.contains_key("purchase_history"));
    }

    #[test]
    fn projection_leaves_the_source_record_untouched() {
        let source = record(&[("name", "Aoki"), ("product", "widget")]);
        let before = source.clone();
        let _ = manifest().project(&source);
        assert_eq!(source, before);
    }
}

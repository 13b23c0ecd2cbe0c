//! Locating the purchaser record behind a purchaser ID.

use std::sync::Arc;

use log::debug;

use crate::error::{Result, SyncError};
use crate::gateway::RecordGateway;
use crate::model::{AppId, FieldMap, FieldValue, RecordId, TableRow};

/// Escape a value for interpolation into a query filter expression.
///
/// Backslashes and double quotes are the only characters with meaning inside
/// a quoted filter literal. Purchaser IDs are allocator output today, but the
/// filter must stay injection-safe if an ID ever passes through user-entered
/// text.
pub fn escape_filter_value(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Build an exact-match filter expression for one field.
pub fn exact_match_filter(field: &str, value: &str) -> String {
    format!("{} = \"{}\"", field, escape_filter_value(value))
}

/// A located purchaser record: its identifier and its history rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetHandle {
    pub record_id: RecordId,
    pub history: Vec<TableRow>,
}

/// Resolves a purchaser ID to the purchaser record holding it.
pub struct LinkageResolver {
    gateway: Arc<dyn RecordGateway>,
    app: AppId,
    purchaser_id_field: String,
    record_id_field: String,
    history_field: String,
}

impl LinkageResolver {
    pub fn new(
        gateway: Arc<dyn RecordGateway>,
        app: AppId,
        purchaser_id_field: impl Into<String>,
        record_id_field: impl Into<String>,
        history_field: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            app,
            purchaser_id_field: purchaser_id_field.into(),
            record_id_field: record_id_field.into(),
            history_field: history_field.into(),
        }
    }

    /// Find the purchaser record carrying `purchaser_id`.
    ///
    /// Requests only the identifier and history fields, and takes the first
    /// match: purchaser IDs are unique by construction, so duplicates are an
    /// operational error elsewhere and are not re-validated here.
    pub async fn resolve(&self, purchaser_id: &str) -> Result<TargetHandle> {
        let filter = exact_match_filter(&self.purchaser_id_field, purchaser_id);
        let fields = [self.record_id_field.clone(), self.history_field.clone()];
        let matches = self
            .gateway
            .query(self.app, &filter, Some(&fields))
            .await?;
        debug!(
            "[PurchaserLink] resolve {}: {} match(es)",
            purchaser_id,
            matches.len()
        );

        let record = matches
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::LinkageNotFound {
                purchaser_id: purchaser_id.to_string(),
            })?;

        let record_id = record
            .get(&self.record_id_field)
            .and_then(FieldValue::as_int)
            .map(RecordId)
            .ok_or_else(|| {
                SyncError::remote_read(format!(
                    "purchaser record for {} is missing its {} field",
                    purchaser_id, self.record_id_field
                ))
            })?;
        let history = record
            .get(&self.history_field)
            .and_then(FieldValue::as_table)
            .map(<[TableRow]>::to_vec)
            .unwrap_or_default();

        Ok(TargetHandle { record_id, history })
    }
}

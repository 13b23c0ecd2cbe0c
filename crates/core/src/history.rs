//! Insert-or-update of purchase-history rows on the purchaser record.
//!
//! The remote store has no partial-row API for nested tables: the table is
//! read, merged in memory, and written back in full. Row order and
//! store-assigned row ids are preserved across the merge.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::{Result, SyncError};
use crate::gateway::RecordGateway;
use crate::model::{AppId, FieldMap, FieldValue, RecordId, TableRow};
use crate::resolver::TargetHandle;

/// What to do when no history row carries the back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRowPolicy {
    /// Append a new row (a new purchase event on an existing purchaser).
    Append,
    /// Report the miss; edits never create history rows.
    Skip,
}

/// How a merge landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Updated,
    Appended,
}

/// Index of history rows keyed by their numeric back-reference.
/// The first row carrying a given back-reference wins; later duplicates are
/// unreachable by construction.
fn row_index(rows: &[TableRow], back_reference_field: &str) -> HashMap<i64, usize> {
    let mut index = HashMap::new();
    for (position, row) in rows.iter().enumerate() {
        if let Some(key) = row.value.get(back_reference_field).and_then(FieldValue::as_int) {
            index.entry(key).or_insert(position);
        }
    }
    index
}

/// Merge `fields` into the row back-referencing `back_reference`, or handle
/// the miss per `policy`. Unrelated fields and rows are left untouched.
fn merge_rows(
    rows: &mut Vec<TableRow>,
    fields: &FieldMap,
    back_reference_field: &str,
    back_reference: RecordId,
    timestamp_field: &str,
    timestamp: &str,
    policy: MissingRowPolicy,
) -> Result<MergeOutcome> {
    let index = row_index(rows, back_reference_field);
    match index.get(&back_reference.0) {
        Some(&position) => {
            let row = &mut rows[position];
            for (code, value) in fields {
                row.value.insert(code.clone(), value.clone());
            }
            Ok(MergeOutcome::Updated)
        }
        None => match policy {
            MissingRowPolicy::Append => {
                let mut value = fields.clone();
                value.insert(
                    back_reference_field.to_string(),
                    FieldValue::number(back_reference.0),
                );
                value.insert(timestamp_field.to_string(), FieldValue::text(timestamp));
                rows.push(TableRow::new(value));
                Ok(MergeOutcome::Appended)
            }
            MissingRowPolicy::Skip => Err(SyncError::RowNotFound {
                back_reference: back_reference.0,
            }),
        },
    }
}

/// Writes history-table merges back to the purchaser record.
pub struct HistoryMergeEngine {
    gateway: Arc<dyn RecordGateway>,
    app: AppId,
    history_field: String,
    back_reference_field: String,
    timestamp_field: String,
}

impl HistoryMergeEngine {
    pub fn new(
        gateway: Arc<dyn RecordGateway>,
        app: AppId,
        history_field: impl Into<String>,
        back_reference_field: impl Into<String>,
        timestamp_field: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            app,
            history_field: history_field.into(),
            back_reference_field: back_reference_field.into(),
            timestamp_field: timestamp_field.into(),
        }
    }

    /// Stamp the seed row of a just-created purchaser record with the payment
    /// record's identifier and timestamp.
    ///
    /// The seed row was written as part of record creation, so it sits at
    /// index 0 and already carries its store-assigned row id; its other
    /// fields are preserved.
    pub async fn finalize(
        &self,
        handle: &TargetHandle,
        back_reference: RecordId,
        timestamp: &str,
    ) -> Result<()> {
        let mut rows = handle.history.clone();
        let seed = rows.first_mut().ok_or(SyncError::RowNotFound {
            back_reference: back_reference.0,
        })?;
        seed.value.insert(
            self.back_reference_field.clone(),
            FieldValue::number(back_reference.0),
        );
        seed.value
            .insert(self.timestamp_field.clone(), FieldValue::text(timestamp));

        debug!(
            "[PurchaserLink] finalize seed row of record {} with back-reference {}",
            handle.record_id, back_reference
        );
        self.write_history(handle.record_id, rows).await
    }

    /// Upsert the history row back-referencing the payment record.
    pub async fn append_or_update(
        &self,
        handle: &TargetHandle,
        fields: &FieldMap,
        back_reference: RecordId,
        timestamp: &str,
        policy: MissingRowPolicy,
    ) -> Result<MergeOutcome> {
        let mut rows = handle.history.clone();
        let outcome = merge_rows(
            &mut rows,
            fields,
            &self.back_reference_field,
            back_reference,
            &self.timestamp_field,
            timestamp,
            policy,
        )?;
        debug!(
            "[PurchaserLink] history merge for back-reference {} on record {}: {:?}",
            back_reference, handle.record_id, outcome
        );
        self.write_history(handle.record_id, rows).await?;
        Ok(outcome)
    }

    async fn write_history(&self, record_id: RecordId, rows: Vec<TableRow>) -> Result<()> {
        let mut patch = FieldMap::new();
        patch.insert(self.history_field.clone(), FieldValue::table(rows));
        self.gateway.update(self.app, record_id, &patch).await
    }
}

//! Workflow configuration: app ids, field codes, projection, retry budget.

use std::time::Duration;

use crate::allocator::IdFormat;
use crate::model::AppId;
use crate::projection::ProjectionManifest;

/// Field code under which the platform exposes a record's own identifier.
pub const RECORD_ID_FIELD: &str = "$id";

/// Retry budget for waiting out read-lag on a freshly created record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

/// Everything the purchaser link workflow needs to know about the two forms.
///
/// The earlier per-form script revisions hard-coded these as constants; one
/// configurable struct replaces the parallel variants. Field-code defaults
/// match the current form layouts, so most deployments only set the app id
/// and the projection manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// App holding the purchaser records.
    pub purchaser_app: AppId,
    /// Field on the payment record carrying the linked purchaser ID.
    pub link_field: String,
    /// Field on the purchaser record carrying its purchaser ID.
    pub purchaser_id_field: String,
    /// Field code of a record's own identifier, on both forms.
    pub record_id_field: String,
    /// Nested purchase-history table on the purchaser record.
    pub history_field: String,
    /// History-row field back-referencing the payment record's identifier.
    pub back_reference_field: String,
    /// History-row field carrying the purchase timestamp.
    pub history_timestamp_field: String,
    /// Payment-record field the purchase timestamp is read from.
    pub source_timestamp_field: String,
    pub manifest: ProjectionManifest,
    pub id_format: IdFormat,
    pub retry: RetryPolicy,
}

impl WorkflowConfig {
    pub fn new(purchaser_app: AppId) -> Self {
        Self {
            purchaser_app,
            link_field: "purchaser_id".to_string(),
            purchaser_id_field: "purchaser_id".to_string(),
            record_id_field: RECORD_ID_FIELD.to_string(),
            history_field: "purchase_history".to_string(),
            back_reference_field: "payment_record_no".to_string(),
            history_timestamp_field: "purchased_at".to_string(),
            source_timestamp_field: "created_at".to_string(),
            manifest: ProjectionManifest::default(),
            id_format: IdFormat::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_manifest(mut self, manifest: ProjectionManifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_id_format(mut self, id_format: IdFormat) -> Self {
        self.id_format = id_format;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_field_code() {
        let config = WorkflowConfig::new(AppId(7));
        assert_eq!(config.purchaser_app, AppId(7));
        assert_eq!(config.record_id_field, "$id");
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.interval, Duration::from_secs(1));
    }
}

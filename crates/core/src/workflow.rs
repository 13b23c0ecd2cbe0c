//! Orchestration of the purchaser link workflow across the save lifecycle.
//!
//! A save of a payment record runs through up to three phases: the pre-save
//! hook (which may create and link a purchaser record), the platform's own
//! persistence of the payment record, and the post-save-success hook (which
//! enriches the purchaser's history table with the now-final record
//! identifier). Pre-save failures abort the save; a payment record is never
//! persisted without either a valid purchaser link or a user-visible error.
//! Post-save failures are logged and swallowed, the record being durably
//! saved already.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::{Result, SyncError};
use crate::gateway::RecordGateway;
use crate::history::{HistoryMergeEngine, MissingRowPolicy};
use crate::model::{FieldMap, FieldValue, RecordId};
use crate::resolver::LinkageResolver;

/// The platform lifecycle hooks this workflow consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleHook {
    BeforeCreateSave,
    BeforeEditSave,
    AfterCreateSaveSuccess,
    AfterEditSaveSuccess,
    FieldChange,
}

/// States of one save operation's journey through the workflow.
///
/// `Idle → Creating → AwaitingFinalize → Done` for a first-time linkage,
/// `Idle → Updating → Done` for saves of an already linked record, and any
/// state `→ Failed` when the pre-save phase aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Creating,
    AwaitingFinalize,
    Updating,
    Done,
    Failed,
}

/// The mutable event object a lifecycle handler receives and returns.
///
/// `operation_id` correlates the phases of one logical save; the platform
/// persists the record between the pre-save and post-save hooks, so the
/// workflow keys its transient state by this id rather than by record
/// identity (new records have none yet).
#[derive(Debug, Clone)]
pub struct SaveEvent {
    pub operation_id: Uuid,
    pub record: FieldMap,
    /// Set by the workflow to abort the save with a user-visible message.
    pub error: Option<String>,
}

impl SaveEvent {
    pub fn new(record: FieldMap) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            record,
            error: None,
        }
    }
}

/// Carries the pre-save creation result to the post-save finalize phase of
/// the same save operation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CorrelationToken {
    purchaser_id: String,
    is_new: bool,
}

/// Sequences projection, creation, ID allocation, linkage resolution and
/// history merging across the lifecycle hooks of the payment form.
pub struct PurchaserLinkWorkflow {
    gateway: Arc<dyn RecordGateway>,
    config: WorkflowConfig,
    resolver: LinkageResolver,
    history: HistoryMergeEngine,
    pending: Mutex<HashMap<Uuid, CorrelationToken>>,
}

impl PurchaserLinkWorkflow {
    pub fn new(gateway: Arc<dyn RecordGateway>, config: WorkflowConfig) -> Self {
        let resolver = LinkageResolver::new(
            gateway.clone(),
            config.purchaser_app,
            config.purchaser_id_field.clone(),
            config.record_id_field.clone(),
            config.history_field.clone(),
        );
        let history = HistoryMergeEngine::new(
            gateway.clone(),
            config.purchaser_app,
            config.history_field.clone(),
            config.back_reference_field.clone(),
            config.history_timestamp_field.clone(),
        );
        Self {
            gateway,
            config,
            resolver,
            history,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Route a lifecycle event to its phase handler.
    pub async fn dispatch(&self, hook: LifecycleHook, event: &mut SaveEvent) -> WorkflowState {
        match hook {
            LifecycleHook::BeforeCreateSave | LifecycleHook::BeforeEditSave => {
                self.before_save(event).await
            }
            LifecycleHook::AfterCreateSaveSuccess => self.after_save_success(event).await,
            LifecycleHook::AfterEditSaveSuccess => self.after_edit_success(event).await,
            // Field-change handlers (derived flags, address mirroring) live
            // outside this workflow; the event passes through untouched.
            LifecycleHook::FieldChange => WorkflowState::Done,
        }
    }

    /// Pre-save phase. Creates and links a purchaser record when the link
    /// field is blank; otherwise there is nothing to do before persistence.
    pub async fn before_save(&self, event: &mut SaveEvent) -> WorkflowState {
        if let Some(existing) = self.link_of(&event.record) {
            debug!(
                "[PurchaserLink] record already linked to {}; nothing to create",
                existing
            );
            return WorkflowState::Done;
        }

        match self.create_linkage(event).await {
            Ok(purchaser_id) => {
                self.pending.lock().await.insert(
                    event.operation_id,
                    CorrelationToken {
                        purchaser_id,
                        is_new: true,
                    },
                );
                WorkflowState::AwaitingFinalize
            }
            Err(err) => {
                warn!("[PurchaserLink] purchaser linkage creation failed: {}", err);
                event.error = Some(format!("Could not register the purchaser record: {}", err));
                WorkflowState::Failed
            }
        }
    }

    /// Post-save-success phase for creates. Finalizes a linkage created by
    /// the immediately preceding pre-save phase, or falls through to the
    /// history-update path for an existing linkage.
    pub async fn after_save_success(&self, event: &mut SaveEvent) -> WorkflowState {
        self.after_success(event, MissingRowPolicy::Append).await
    }

    /// Post-save-success phase for edits. Edits never fabricate purchaser
    /// records or history rows; a save whose back-reference matches no row
    /// pre-dates the linkage history and is skipped.
    pub async fn after_edit_success(&self, event: &mut SaveEvent) -> WorkflowState {
        self.after_success(event, MissingRowPolicy::Skip).await
    }

    async fn after_success(
        &self,
        event: &mut SaveEvent,
        missing_row: MissingRowPolicy,
    ) -> WorkflowState {
        let token = self.pending.lock().await.remove(&event.operation_id);
        let link = self.link_of(&event.record);

        match (token, link) {
            (Some(token), Some(link)) if token.is_new && token.purchaser_id == link => {
                self.finalize_linkage(event, &token.purchaser_id).await;
            }
            (token, Some(link)) => {
                if token.is_some() {
                    debug!(
                        "[PurchaserLink] stale correlation token for operation {}; treating as existing linkage",
                        event.operation_id
                    );
                }
                self.update_history(event, &link, missing_row).await;
            }
            (_, None) => {
                debug!("[PurchaserLink] saved record has no purchaser linkage; nothing to enrich");
            }
        }
        WorkflowState::Done
    }

    /// The `Creating` phase: project, create, wait out read-lag, allocate the
    /// purchaser ID, write it onto the new record, and mirror it onto the
    /// in-memory payment record so the platform persists the linkage.
    async fn create_linkage(&self, event: &mut SaveEvent) -> Result<String> {
        let payload = self.config.manifest.project(&event.record);
        let record_id = self
            .gateway
            .create(self.config.purchaser_app, &payload)
            .await?;
        self.await_visible(record_id).await?;

        let purchaser_id = self.config.id_format.allocate(record_id);
        let mut patch = FieldMap::new();
        patch.insert(
            self.config.purchaser_id_field.clone(),
            FieldValue::text(&purchaser_id),
        );
        self.gateway
            .update(self.config.purchaser_app, record_id, &patch)
            .await?;

        event.record.insert(
            self.config.link_field.clone(),
            FieldValue::text(&purchaser_id),
        );
        info!(
            "[PurchaserLink] allocated {} for purchaser record {}",
            purchaser_id, record_id
        );
        Ok(purchaser_id)
    }

    /// Poll until the freshly created record is readable. Record creation is
    /// acknowledged before the record becomes visible to reads, so 404s
    /// within the retry budget are read-lag, not failures.
    async fn await_visible(&self, record_id: RecordId) -> Result<()> {
        let retry = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.gateway.get(self.config.purchaser_app, record_id).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_not_found() && attempt < retry.max_attempts => {
                    debug!(
                        "[PurchaserLink] record {} not visible yet (attempt {}/{})",
                        record_id, attempt, retry.max_attempts
                    );
                    sleep(retry.interval).await;
                }
                Err(err) if err.is_not_found() => {
                    return Err(SyncError::AllocationExhausted { attempts: attempt });
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn finalize_linkage(&self, event: &SaveEvent, purchaser_id: &str) {
        let Some(back_reference) = self.source_record_id(&event.record) else {
            warn!(
                "[PurchaserLink] saved record carries no {} field; cannot finalize history",
                self.config.record_id_field
            );
            return;
        };
        let timestamp = self.purchase_timestamp(&event.record);

        let result = async {
            let handle = self.resolver.resolve(purchaser_id).await?;
            self.history
                .finalize(&handle, back_reference, &timestamp)
                .await
        }
        .await;

        match result {
            Ok(()) => debug!("[PurchaserLink] finalized history for {}", purchaser_id),
            Err(err) if err.is_soft() => {
                info!("[PurchaserLink] skipping history finalize: {}", err);
            }
            Err(err) => warn!(
                "[PurchaserLink] history finalize failed (payment record already saved): {}",
                err
            ),
        }
    }

    async fn update_history(
        &self,
        event: &SaveEvent,
        purchaser_id: &str,
        missing_row: MissingRowPolicy,
    ) {
        let Some(back_reference) = self.source_record_id(&event.record) else {
            warn!(
                "[PurchaserLink] saved record carries no {} field; cannot update history",
                self.config.record_id_field
            );
            return;
        };
        let fields = self.config.manifest.table_row(&event.record);
        let timestamp = self.purchase_timestamp(&event.record);

        let result = async {
            let handle = self.resolver.resolve(purchaser_id).await?;
            self.history
                .append_or_update(&handle, &fields, back_reference, &timestamp, missing_row)
                .await
        }
        .await;

        match result {
            Ok(outcome) => debug!(
                "[PurchaserLink] history merge for {}: {:?}",
                purchaser_id, outcome
            ),
            Err(err) if err.is_soft() => {
                info!("[PurchaserLink] skipping history update: {}", err);
            }
            Err(err) => warn!(
                "[PurchaserLink] history update failed (payment record already saved): {}",
                err
            ),
        }
    }

    fn link_of(&self, record: &FieldMap) -> Option<String> {
        record
            .get(&self.config.link_field)
            .and_then(FieldValue::as_text)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn source_record_id(&self, record: &FieldMap) -> Option<RecordId> {
        record
            .get(&self.config.record_id_field)
            .and_then(FieldValue::as_int)
            .map(RecordId)
    }

    fn purchase_timestamp(&self, record: &FieldMap) -> String {
        record
            .get(&self.config.source_timestamp_field)
            .and_then(FieldValue::as_text)
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().to_rfc3339())
    }
}

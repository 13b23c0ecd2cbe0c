//! Core of the purchaser link synchronizer.
//!
//! Keeps a payment record linked to its purchaser record in a second app on
//! the hosted record platform: allocates a human-readable purchaser ID when
//! a payment for a new purchaser is saved, and maintains the purchaser's
//! nested purchase-history table across later saves and edits. Talks to the
//! platform through the [`gateway::RecordGateway`] trait; the HTTP
//! implementation lives in the `formlink-gateway` crate.

pub mod allocator;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod model;
pub mod projection;
pub mod resolver;
pub mod workflow;

pub use allocator::IdFormat;
pub use config::{RetryPolicy, WorkflowConfig, RECORD_ID_FIELD};
pub use error::{Result, SyncError};
pub use gateway::RecordGateway;
pub use history::{HistoryMergeEngine, MergeOutcome, MissingRowPolicy};
pub use model::{AppId, FieldMap, FieldValue, RecordId, TableRow};
pub use projection::{FieldMapping, FieldSource, ProjectionManifest, TableProjection};
pub use resolver::{exact_match_filter, LinkageResolver, TargetHandle};
pub use workflow::{LifecycleHook, PurchaserLinkWorkflow, SaveEvent, WorkflowState};

//! Contract of the remote record store.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{AppId, FieldMap, RecordId};

/// CRUD surface of the platform's record API, as consumed by the
/// synchronization workflow.
///
/// Implementations do not retry internally; retry policy belongs to callers.
/// `update` has partial semantics for flat fields (untouched fields on the
/// remote are preserved) but nested tables are replaced wholesale: writing a
/// table field overwrites the full row set, so callers must read, merge in
/// memory, and write the complete table back.
#[async_trait]
pub trait RecordGateway: Send + Sync {
    /// Create a record, returning its store-assigned identifier.
    async fn create(&self, app: AppId, record: &FieldMap) -> Result<RecordId>;

    /// Partially update a record by identifier.
    async fn update(&self, app: AppId, id: RecordId, record: &FieldMap) -> Result<()>;

    /// Fetch a record by identifier. Fails with a 404-flavored read error
    /// when the record does not exist (or is not visible yet).
    async fn get(&self, app: AppId, id: RecordId) -> Result<FieldMap>;

    /// Query records matching a filter expression, optionally restricting the
    /// returned fields. Zero matches is a normal, non-error outcome.
    async fn query(
        &self,
        app: AppId,
        filter: &str,
        fields: Option<&[String]>,
    ) -> Result<Vec<FieldMap>>;
}

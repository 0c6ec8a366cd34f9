//! HistorySyncStore port - history sync notification の保存先

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    CycleId, HistorySyncPayload, InstanceId, StoreError, SyncPayloadId, SyncPayloadStatus,
};

#[async_trait]
pub trait HistorySyncStore: Send + Sync {
    async fn create(&self, payload: HistorySyncPayload) -> Result<HistorySyncPayload, StoreError>;

    /// Pending payloads of an instance, oldest first.
    async fn list_pending_by_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<HistorySyncPayload>, StoreError>;

    /// Pending payloads tagged with `cycle_id`, oldest first.
    async fn list_pending_by_cycle(
        &self,
        instance_id: &InstanceId,
        cycle_id: CycleId,
    ) -> Result<Vec<HistorySyncPayload>, StoreError>;

    /// Unknown ids yield `StoreError::NotFound`.
    async fn update_status(
        &self,
        id: SyncPayloadId,
        status: SyncPayloadStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn delete_by_instance(&self, instance_id: &InstanceId) -> Result<(), StoreError>;
}

//! InstanceStore port - インスタンス管理サービスのレコード

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CycleId, HistorySyncStatus, Instance, InstanceId, StoreError};

#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Unknown ids yield `StoreError::NotFound`.
    async fn get_by_id(&self, id: &InstanceId) -> Result<Instance, StoreError>;

    async fn update(&self, instance: Instance) -> Result<Instance, StoreError>;

    /// Write the terminal history sync `status`, but only while `cycle_id` is
    /// still the stored cycle (compare-and-set). `None` means another cycle
    /// has taken over and nothing was written.
    async fn finish_history_sync(
        &self,
        id: &InstanceId,
        cycle_id: CycleId,
        status: HistorySyncStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Instance>, StoreError>;
}

//! History sync notifications persisted for later (deferred) processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CycleId, InstanceId, SyncPayloadId};

/// Payload type recorded for reconciliation notifications from the transport.
pub const HISTORY_SYNC_NOTIFICATION: &str = "HistorySyncNotification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPayloadStatus {
    Pending,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySyncPayload {
    pub id: SyncPayloadId,
    pub instance_id: InstanceId,
    pub payload_type: String,
    pub payload: Vec<u8>,
    /// Cycle that was current when the notification arrived (if any).
    pub cycle_id: Option<CycleId>,
    pub status: SyncPayloadStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl HistorySyncPayload {
    pub fn pending(
        id: SyncPayloadId,
        instance_id: InstanceId,
        payload_type: impl Into<String>,
        payload: Vec<u8>,
        cycle_id: Option<CycleId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            instance_id,
            payload_type: payload_type.into(),
            payload,
            cycle_id,
            status: SyncPayloadStatus::Pending,
            created_at: now,
            processed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SyncPayloadStatus::Pending
    }
}

/// Download metadata carried by a reconciliation notification.
///
/// Only what the processor logs is decoded; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncNotification {
    #[serde(default)]
    pub direct_path: String,
    #[serde(default)]
    pub file_length: u64,
    #[serde(default)]
    pub sync_type: i32,
    #[serde(default)]
    pub chunk_order: u32,
}

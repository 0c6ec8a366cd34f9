//! Instance - テナントの接続（外部のライフサイクルサービスが所有）
//!
//! このクレートが読むのは `status` だけで、書き込むのは
//! history sync 系のフィールドとエラー時の `status` 降格だけです。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CycleId, InstanceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Active,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySyncStatus {
    #[default]
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub status: InstanceStatus,
    pub history_sync_cycle_id: Option<CycleId>,
    pub history_sync_status: HistorySyncStatus,
    pub history_sync_updated_at: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn new(id: InstanceId, status: InstanceStatus) -> Self {
        Self {
            id,
            status,
            history_sync_cycle_id: None,
            history_sync_status: HistorySyncStatus::Idle,
            history_sync_updated_at: None,
        }
    }

    /// Dispatch is only permitted while the instance is active.
    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    pub fn begin_history_sync(&mut self, cycle_id: CycleId, now: DateTime<Utc>) {
        self.history_sync_cycle_id = Some(cycle_id);
        self.history_sync_status = HistorySyncStatus::Running;
        self.history_sync_updated_at = Some(now);
    }

    pub fn finish_history_sync(&mut self, status: HistorySyncStatus, now: DateTime<Utc>) {
        self.history_sync_status = status;
        self.history_sync_updated_at = Some(now);
    }
}

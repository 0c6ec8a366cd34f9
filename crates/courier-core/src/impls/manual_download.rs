//! ManualDownloadProcessor - manual download モードの既定 processor
//!
//! notification のメタデータをデコードしてログに残すだけで、download はしません。
//! 履歴本体はセッション側が取り込み済みという前提です。

use async_trait::async_trait;
use tracing::{error, info};

use crate::domain::{HistorySyncError, HistorySyncPayload, SyncNotification};
use crate::ports::HistorySyncProcessor;

#[derive(Debug, Clone, Copy, Default)]
pub struct ManualDownloadProcessor;

#[async_trait]
impl HistorySyncProcessor for ManualDownloadProcessor {
    async fn process(&self, payload: &HistorySyncPayload) -> Result<(), HistorySyncError> {
        let notif: SyncNotification = serde_json::from_slice(&payload.payload).map_err(|e| {
            error!(
                instance_id = %payload.instance_id,
                payload_id = %payload.id,
                error = %e,
                "failed to decode history sync notification"
            );
            HistorySyncError::Processor(format!("decode {}: {e}", payload.id))
        })?;

        info!(
            instance_id = %payload.instance_id,
            payload_id = %payload.id,
            sync_type = notif.sync_type,
            chunk_order = notif.chunk_order,
            "history sync notification acknowledged without download"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstanceId, SyncPayloadId};
    use chrono::Utc;
    use ulid::Ulid;

    fn payload(bytes: &[u8]) -> HistorySyncPayload {
        HistorySyncPayload::pending(
            SyncPayloadId::from_ulid(Ulid::new()),
            InstanceId::new("A"),
            "HistorySyncNotification",
            bytes.to_vec(),
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn accepts_well_formed_notification() {
        let p = payload(br#"{"syncType":2,"chunkOrder":4}"#);
        assert!(ManualDownloadProcessor.process(&p).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_undecodable_payload() {
        let p = payload(b"not json");
        let err = ManualDownloadProcessor.process(&p).await.unwrap_err();
        assert!(matches!(err, HistorySyncError::Processor(_)));
    }
}

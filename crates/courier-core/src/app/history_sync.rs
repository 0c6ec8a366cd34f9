//! HistorySyncCoordinator - instance ごとの history sync cycle
//!
//! # 状態遷移（instance ごと）
//! `idle → running → completed`（失敗状態は持たない。完了しない cycle は
//! 次の cycle に置き換えられるまで running のまま）
//!
//! # 設計
//! - cycle の開始: 新しい cycle id と running を Instance に書き、worker を起動する。
//!   同じ instance の worker が生きていれば先にキャンセルする（`CycleRegistry::replace`）
//! - worker: 固定の待ち時間のあと cycle を completed で確定する。
//!   ただし Instance に保存された cycle id が自分のものでなければ何もしない
//! - 確定: Instance に終端 status を書いてから handle を外してキャンセル（冪等）
//! - notification: 現在の cycle id を付けて pending で保存し、
//!   `process_pending` が差し替え可能な processor に 1 件ずつ渡す

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::app::registry::{CycleHandle, CycleRegistry};
use crate::config::HistorySyncConfig;
use crate::domain::history_sync::HISTORY_SYNC_NOTIFICATION;
use crate::domain::{
    CycleId, HistorySyncError, HistorySyncPayload, HistorySyncStatus, InstanceId,
    SyncPayloadStatus,
};
use crate::ports::{Clock, HistorySyncProcessor, HistorySyncStore, IdGenerator, InstanceStore};

#[derive(Clone)]
pub struct HistorySyncCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    instances: Arc<dyn InstanceStore>,
    payloads: Arc<dyn HistorySyncStore>,
    processor: Arc<dyn HistorySyncProcessor>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    registry: CycleRegistry,
    config: HistorySyncConfig,
}

impl HistorySyncCoordinator {
    pub fn new(
        instances: Arc<dyn InstanceStore>,
        payloads: Arc<dyn HistorySyncStore>,
        processor: Arc<dyn HistorySyncProcessor>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        config: HistorySyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                instances,
                payloads,
                processor,
                ids,
                clock,
                registry: CycleRegistry::new(),
                config,
            }),
        }
    }

    /// Begin a new cycle, superseding (and cancelling) any running one.
    #[instrument(skip_all, fields(instance_id = %instance_id))]
    pub async fn start_cycle(&self, instance_id: &InstanceId) -> Result<CycleId, HistorySyncError> {
        let inner = &self.inner;
        let cycle_id = inner.ids.generate_cycle_id();

        let mut instance = inner.instances.get_by_id(instance_id).await?;
        instance.begin_history_sync(cycle_id, inner.clock.now());
        inner.instances.update(instance).await?;

        let handle = CycleHandle::new(cycle_id);
        let token = handle.token();
        if let Some(previous) = inner.registry.replace(instance_id.clone(), handle) {
            info!(previous = %previous.cycle_id(), %cycle_id, "superseded running history sync cycle");
        }

        let this = self.clone();
        let id = instance_id.clone();
        tokio::spawn(async move {
            this.run_cycle(id, cycle_id, token).await;
        });

        info!(%cycle_id, "history sync cycle started");
        Ok(cycle_id)
    }

    /// Write the terminal status, then drop and cancel the instance's worker.
    /// Calling it again is a no-op.
    pub async fn finalize_cycle(
        &self,
        instance_id: &InstanceId,
        status: HistorySyncStatus,
    ) -> Result<(), HistorySyncError> {
        let inner = &self.inner;
        let mut instance = inner.instances.get_by_id(instance_id).await?;
        if instance.history_sync_status != status {
            instance.finish_history_sync(status, inner.clock.now());
            inner.instances.update(instance).await?;
            info!(%instance_id, ?status, "history sync cycle finalized");
        }
        if let Some(handle) = inner.registry.release(instance_id) {
            debug!(%instance_id, cycle_id = %handle.cycle_id(), "cycle worker released");
        }
        Ok(())
    }

    /// Stop the instance's worker without finalizing (status stays `running`).
    /// Returns whether a worker was live.
    pub fn cancel(&self, instance_id: &InstanceId) -> bool {
        let released = self.inner.registry.release(instance_id);
        if let Some(handle) = &released {
            info!(%instance_id, cycle_id = %handle.cycle_id(), "history sync cycle cancelled");
        }
        released.is_some()
    }

    pub fn is_running(&self, instance_id: &InstanceId) -> bool {
        self.active_cycle(instance_id).is_some()
    }

    pub fn active_cycle(&self, instance_id: &InstanceId) -> Option<CycleId> {
        self.inner
            .registry
            .acquire(instance_id)
            .filter(|h| !h.is_cancelled())
            .map(|h| h.cycle_id())
    }

    /// Persist a reconciliation notification, tagged with the instance's
    /// current cycle.
    pub async fn record_notification(
        &self,
        instance_id: &InstanceId,
        payload: Vec<u8>,
    ) -> Result<HistorySyncPayload, HistorySyncError> {
        let inner = &self.inner;
        let instance = inner.instances.get_by_id(instance_id).await?;
        let record = HistorySyncPayload::pending(
            inner.ids.generate_sync_payload_id(),
            instance_id.clone(),
            HISTORY_SYNC_NOTIFICATION,
            payload,
            instance.history_sync_cycle_id,
            inner.clock.now(),
        );
        let record = inner.payloads.create(record).await?;
        debug!(%instance_id, payload_id = %record.id, "history sync notification recorded");
        Ok(record)
    }

    /// Hand each pending payload of the current cycle to the processor.
    /// Processed payloads are marked done; failures stay pending.
    pub async fn process_pending(&self, instance_id: &InstanceId) -> Result<usize, HistorySyncError> {
        let inner = &self.inner;
        let instance = inner.instances.get_by_id(instance_id).await?;
        let pending = match instance.history_sync_cycle_id {
            Some(cycle_id) => {
                inner
                    .payloads
                    .list_pending_by_cycle(instance_id, cycle_id)
                    .await?
            }
            None => inner.payloads.list_pending_by_instance(instance_id).await?,
        };

        let mut processed = 0;
        for payload in &pending {
            if let Err(e) = inner.processor.process(payload).await {
                warn!(%instance_id, payload_id = %payload.id, error = %e, "history sync payload left pending");
                continue;
            }
            inner
                .payloads
                .update_status(payload.id, SyncPayloadStatus::Done, Some(inner.clock.now()))
                .await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Drop every stored payload of the instance.
    pub async fn purge(&self, instance_id: &InstanceId) -> Result<(), HistorySyncError> {
        self.inner.payloads.delete_by_instance(instance_id).await?;
        info!(%instance_id, "history sync payloads purged");
        Ok(())
    }

    async fn run_cycle(&self, instance_id: InstanceId, cycle_id: CycleId, token: CancellationToken) {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(%instance_id, %cycle_id, "cycle worker cancelled");
                return;
            }
            _ = tokio::time::sleep(self.inner.config.completion_delay()) => {}
        }

        if let Err(e) = self.finalize_if_current(&instance_id, cycle_id).await {
            error!(%instance_id, %cycle_id, error = %e, "failed to finalize history sync cycle");
        }
    }

    async fn finalize_if_current(
        &self,
        instance_id: &InstanceId,
        cycle_id: CycleId,
    ) -> Result<(), HistorySyncError> {
        let inner = &self.inner;
        let status = HistorySyncStatus::Completed;
        let finished = inner
            .instances
            .finish_history_sync(instance_id, cycle_id, status, inner.clock.now())
            .await?;
        if finished.is_none() {
            debug!(%instance_id, %cycle_id, "stale cycle worker, not finalizing");
            return Ok(());
        }
        info!(%instance_id, ?status, "history sync cycle finalized");
        if inner.registry.release_cycle(instance_id, cycle_id).is_some() {
            debug!(%instance_id, %cycle_id, "cycle worker released");
        }
        Ok(())
    }
}

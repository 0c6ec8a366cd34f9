//! Outbox - キュー経由の（非同期）送信
//!
//! # 構成
//! - `submit`: Message を queued で書いてから QueueEvent を積む（event id = message id）
//! - N 個の worker: dequeue（1 秒待ち）→ DispatchService::send
//! - 1 個の recovery sweep: 30 秒ごとに stuck な Message を再投入
//!
//! すべて 1 つの CancellationToken のスコープ下で動き、
//! `shutdown_and_join` はキャンセル後に全タスクの終了を待ちます。
//! 実行中の send は中断せず、それ自身の成否で終わらせます。
//!
//! # 失敗の扱い
//! - Permanent（入力が悪い）: Message を failed にして、sweep の対象から外す
//! - それ以外: ログのみ。queued / sending のまま残れば sweep が拾う
//! - transmission の失敗は DispatchService が failed にするので再送しない

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::app::dispatch::{DispatchService, SendInput};
use crate::app::recovery::RecoverySweep;
use crate::app::secondary::secondary_effect;
use crate::config::OutboxConfig;
use crate::domain::{
    DispatchError, ErrorKind, InstanceId, Message, MessageId, MessageKind, MessageStatus,
    QueueError, QueueEvent,
};
use crate::ports::{Clock, DeliveryQueue, IdGenerator, MessageStore};

/// A queued send request. Events carry no media bytes, so only text is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueInput {
    pub instance_id: InstanceId,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl EnqueueInput {
    pub fn text(instance_id: InstanceId, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            instance_id,
            to: to.into(),
            kind: MessageKind::Text.as_str().to_string(),
            text: text.into(),
        }
    }
}

pub struct Outbox {
    dispatch: Arc<DispatchService>,
    messages: Arc<dyn MessageStore>,
    queue: Arc<dyn DeliveryQueue>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: OutboxConfig,
}

impl Outbox {
    pub fn new(
        dispatch: Arc<DispatchService>,
        messages: Arc<dyn MessageStore>,
        queue: Arc<dyn DeliveryQueue>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        config: OutboxConfig,
    ) -> Self {
        Self {
            dispatch,
            messages,
            queue,
            ids,
            clock,
            config,
        }
    }

    /// Persist a queued Message, then push its event. A failed push is only
    /// logged: the row stays queued and the recovery sweep resends it.
    #[instrument(skip_all, fields(instance_id = %input.instance_id))]
    pub async fn submit(&self, input: EnqueueInput) -> Result<Message, DispatchError> {
        if input.instance_id.is_empty() || input.to.is_empty() || input.text.is_empty() {
            return Err(DispatchError::InvalidPayload(
                "instance_id, to and text are required".into(),
            ));
        }
        match MessageKind::parse(input.kind.trim()) {
            Some(MessageKind::Text) => {}
            _ => return Err(DispatchError::UnsupportedMediaType(input.kind)),
        }

        let message = Message::new(
            self.ids.generate_message_id(),
            input.instance_id,
            input.to,
            MessageKind::Text,
            input.text,
            MessageStatus::Queued,
            self.clock.now(),
        );
        let message = self.messages.create(message).await?;

        secondary_effect(
            "enqueue_outbox_event",
            self.queue.enqueue(QueueEvent::from_message(&message)),
        )
        .await;
        debug!(message_id = %message.id, "message queued");
        Ok(message)
    }

    pub fn recovery(&self) -> RecoverySweep {
        RecoverySweep::new(
            self.messages.clone(),
            self.queue.clone(),
            self.config.recovery_batch,
        )
    }

    /// Spawn the workers and the recovery sweep under a child of `scope`.
    pub fn start(self: &Arc<Self>, scope: &CancellationToken) -> OutboxWorkerPool {
        let shutdown = scope.child_token();
        let mut joins = Vec::with_capacity(self.config.workers + 1);

        for worker in 0..self.config.workers {
            let outbox = Arc::clone(self);
            let token = shutdown.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker, outbox, token).await;
            }));
        }
        joins.push(tokio::spawn(
            self.recovery()
                .run(self.config.recovery_interval(), shutdown.clone()),
        ));

        info!(workers = self.config.workers, "outbox started");
        OutboxWorkerPool { shutdown, joins }
    }

    /// Run one event through the dispatch service. Never fails the caller.
    pub async fn process_event(&self, worker: usize, event: QueueEvent) {
        let message_id = event.id;
        let input = match SendInput::from_event(&event) {
            Ok(input) => input,
            Err(e) => {
                self.give_up(worker, message_id, &e).await;
                return;
            }
        };

        match self.dispatch.send(input).await {
            Ok(message) => {
                debug!(worker, %message_id, status = %message.status, "queued message processed");
            }
            Err(failure) if failure.kind() == ErrorKind::Permanent => {
                self.give_up(worker, message_id, &failure.error).await;
            }
            Err(failure) => {
                error!(worker, %message_id, error = %failure, "queued send failed");
            }
        }
    }

    async fn give_up(&self, worker: usize, message_id: MessageId, e: &DispatchError) {
        error!(worker, %message_id, error = %e, "queued message rejected, marking failed");
        secondary_effect("fail_queued_message", self.dispatch.fail_pending(message_id)).await;
    }
}

/// Handle of the running pool.
/// - `request_shutdown` でスコープをキャンセル（新しい dequeue をやめる）
/// - `shutdown_and_join` で全タスクの終了を待つ
pub struct OutboxWorkerPool {
    shutdown: CancellationToken,
    joins: Vec<JoinHandle<()>>,
}

impl OutboxWorkerPool {
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for every task; returns once the scope was cancelled (here or by
    /// the parent) and all of them exited.
    pub async fn join(self) {
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "outbox task panicked");
            }
        }
        info!("outbox stopped");
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        self.join().await;
    }

    /// Workers plus the recovery sweep.
    pub fn task_count(&self) -> usize {
        self.joins.len()
    }
}

async fn worker_loop(worker: usize, outbox: Arc<Outbox>, shutdown: CancellationToken) {
    let wait = outbox.config.dequeue_timeout();
    debug!(worker, "outbox worker started");
    loop {
        // dequeue は最大 wait だけ待つので、shutdown と競合させる
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = outbox.queue.dequeue(wait) => next,
        };

        match next {
            Ok(Some(event)) => outbox.process_event(worker, event).await,
            Ok(None) => continue,
            Err(QueueError::Closed) => {
                info!(worker, "queue closed, worker exiting");
                break;
            }
            Err(e) => {
                warn!(worker, error = %e, "dequeue failed");
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
    }
    debug!(worker, "outbox worker stopped");
}

//! InMemoryDeliveryQueue - 開発用の配送キュー
//!
//! - Mutex<VecDeque> で FIFO
//! - Notify で enqueue 時に待機中の dequeue を起こす
//! - `close()` 後の enqueue は `QueueError::Closed`（障害の再現に使う）

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use crate::domain::{QueueError, QueueEvent};
use crate::ports::DeliveryQueue;

#[derive(Default)]
pub struct InMemoryDeliveryQueue {
    events: Mutex<VecDeque<QueueEvent>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryDeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    /// Refuse further enqueues; already queued events can still be drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    async fn enqueue(&self, event: QueueEvent) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        self.events.lock().await.push_back(event);
        // ロックを外してから通知
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<QueueEvent>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(event) = self.events.lock().await.pop_front() {
                return Ok(Some(event));
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(QueueError::Closed);
            }
            // notify_one は待機者がいなければ permit を残すので、
            // pop と notified の間に enqueue されても取りこぼさない
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(self.events.lock().await.pop_front());
            }
        }
    }
}

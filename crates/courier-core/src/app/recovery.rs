//! RecoverySweep - 途中で止まった Message をキューに戻す
//!
//! MessageStore が正本で、キューはその上のベストエフォート配送です。
//! queued / sending のまま残っている行（プロセス再起動や、キューが失った event）を
//! 一定間隔で拾い、QueueEvent を組み直して再投入します。
//! failed は対象外（stuck と failed は区別する）。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{QueueEvent, StoreError};
use crate::ports::{DeliveryQueue, MessageStore};

#[derive(Clone)]
pub struct RecoverySweep {
    messages: Arc<dyn MessageStore>,
    queue: Arc<dyn DeliveryQueue>,
    batch: usize,
}

impl RecoverySweep {
    pub fn new(messages: Arc<dyn MessageStore>, queue: Arc<dyn DeliveryQueue>, batch: usize) -> Self {
        Self {
            messages,
            queue,
            batch,
        }
    }

    /// One pass. Returns how many events were re-enqueued.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let stuck = self.messages.get_pending(self.batch).await?;
        let mut requeued = 0;
        for message in &stuck {
            match self.queue.enqueue(QueueEvent::from_message(message)).await {
                Ok(()) => requeued += 1,
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "failed to re-enqueue stuck message");
                }
            }
        }
        if requeued > 0 {
            info!(requeued, found = stuck.len(), "re-enqueued stuck messages");
        } else {
            debug!("no stuck messages");
        }
        Ok(requeued)
    }

    /// Sweep every `period` until `shutdown` fires. The first sweep happens one
    /// period after start.
    pub async fn run(self, period: Duration, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "recovery sweep failed");
                    }
                }
            }
        }
        debug!("recovery sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstanceId, Message, MessageId, MessageKind, MessageStatus};
    use crate::impls::{InMemoryDeliveryQueue, InMemoryMessageStore};
    use chrono::{Duration as ChronoDuration, Utc};
    use rstest::rstest;
    use ulid::Ulid;

    async fn seed(store: &InMemoryMessageStore, status: MessageStatus, age_secs: i64) -> MessageId {
        let id = MessageId::from_ulid(Ulid::new());
        store
            .create(Message::new(
                id,
                InstanceId::new("A"),
                "5511988887777",
                MessageKind::Text,
                format!("{status}"),
                status,
                Utc::now() - ChronoDuration::seconds(age_secs),
            ))
            .await
            .unwrap();
        id
    }

    async fn drain(queue: &InMemoryDeliveryQueue) -> Vec<QueueEvent> {
        let mut out = Vec::new();
        while let Some(e) = queue.dequeue(Duration::ZERO).await.unwrap() {
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn only_non_terminal_rows_are_requeued() {
        let store = Arc::new(InMemoryMessageStore::new());
        let queue = Arc::new(InMemoryDeliveryQueue::new());
        let queued = seed(&store, MessageStatus::Queued, 30).await;
        let sending = seed(&store, MessageStatus::Sending, 20).await;
        seed(&store, MessageStatus::Sent, 10).await;
        seed(&store, MessageStatus::Failed, 5).await;

        let sweep = RecoverySweep::new(store.clone(), queue.clone(), 50);
        assert_eq!(sweep.sweep_once().await.unwrap(), 2);

        let events = drain(&queue).await;
        let ids: Vec<MessageId> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![queued, sending]);
        assert_eq!(events[1].text(), "sending");
        assert_eq!(events[1].to(), "5511988887777");
        assert_eq!(events[1].kind, "text");
    }

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(50, 3)]
    #[tokio::test]
    async fn batch_bounds_one_pass(#[case] batch: usize, #[case] expected: usize) {
        let store = Arc::new(InMemoryMessageStore::new());
        let queue = Arc::new(InMemoryDeliveryQueue::new());
        for age in [3, 2, 1] {
            seed(&store, MessageStatus::Queued, age).await;
        }

        let sweep = RecoverySweep::new(store, queue.clone(), batch);
        assert_eq!(sweep.sweep_once().await.unwrap(), expected);
        assert_eq!(queue.len().await, expected);
    }

    #[tokio::test]
    async fn closed_queue_is_reported_not_fatal() {
        let store = Arc::new(InMemoryMessageStore::new());
        let queue = Arc::new(InMemoryDeliveryQueue::new());
        seed(&store, MessageStatus::Queued, 1).await;
        queue.close();

        let sweep = RecoverySweep::new(store, queue, 50);
        assert_eq!(sweep.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_sweeps_each_period_until_cancelled() {
        let store = Arc::new(InMemoryMessageStore::new());
        let queue = Arc::new(InMemoryDeliveryQueue::new());
        seed(&store, MessageStatus::Sending, 1).await;
        let shutdown = CancellationToken::new();

        let sweep = RecoverySweep::new(store, queue.clone(), 50);
        let handle = tokio::spawn(sweep.run(Duration::from_secs(30), shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(queue.is_empty().await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(queue.len().await, 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(queue.len().await, 2);

        shutdown.cancel();
        handle.await.unwrap();
    }
}

//! DeliveryQueue port - outbox の配送キュー（Redis または InMemory）
//!
//! # 設計原則
//! - キューはベストエフォート。正本は MessageStore
//! - dequeue は timeout 付きの blocking pop（空なら `Ok(None)`）

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{QueueError, QueueEvent};

#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn enqueue(&self, event: QueueEvent) -> Result<(), QueueError>;

    async fn dequeue(&self, timeout: Duration) -> Result<Option<QueueEvent>, QueueError>;
}

//! MessageStore port - Message の正本（source of truth）
//!
//! キューはベストエフォートの配送でしかなく、
//! 「送るべきものが残っているか」はこのストアから再構築できなければなりません。

use async_trait::async_trait;

use crate::domain::{InstanceId, Message, MessageId, StoreError};

/// # 設計原則
/// - `update` は終端状態（sent / failed）からの後退を拒否する（`StoreError::Conflict`）
/// - `get_pending` は queued / sending のものだけを古い順に返す
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, message: Message) -> Result<Message, StoreError>;

    async fn update(&self, message: &Message) -> Result<(), StoreError>;

    async fn get(&self, id: MessageId) -> Result<Option<Message>, StoreError>;

    /// Messages in a non-terminal status, oldest first, at most `limit`.
    async fn get_pending(&self, limit: usize) -> Result<Vec<Message>, StoreError>;

    async fn list_by_instance(&self, instance_id: &InstanceId) -> Result<Vec<Message>, StoreError>;
}

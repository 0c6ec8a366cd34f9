//! In-memory stores (開発用・テスト用).
//!
//! 本番では relational / embedded DB の実装に差し替えます。ここでは port の
//! 契約（終端状態から後退しない、pending は古い順、など）だけを忠実に守ります。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::{
    CycleId, HistorySyncPayload, HistorySyncStatus, Instance, InstanceId, Message, MessageId,
    StoreError, SyncPayloadId, SyncPayloadStatus,
};
use crate::ports::{HistorySyncStore, InstanceStore, MessageStore};

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<HashMap<MessageId, Message>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create(&self, message: Message) -> Result<Message, StoreError> {
        let mut messages = self.messages.lock().await;
        if messages.contains_key(&message.id) {
            return Err(StoreError::Conflict(format!(
                "message {} already exists",
                message.id
            )));
        }
        messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn update(&self, message: &Message) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().await;
        let Some(current) = messages.get_mut(&message.id) else {
            return Err(StoreError::NotFound(message.id.to_string()));
        };
        if !current.status.can_transition_to(message.status) {
            return Err(StoreError::Conflict(format!(
                "message {} cannot move from {} to {}",
                message.id, current.status, message.status
            )));
        }
        *current = message.clone();
        Ok(())
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        Ok(self.messages.lock().await.get(&id).cloned())
    }

    async fn get_pending(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().await;
        let mut pending: Vec<Message> = messages
            .values()
            .filter(|m| !m.status.is_terminal())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn list_by_instance(&self, instance_id: &InstanceId) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().await;
        let mut list: Vec<Message> = messages
            .values()
            .filter(|m| &m.instance_id == instance_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(list)
    }
}

#[derive(Default)]
pub struct InMemoryInstanceStore {
    instances: Mutex<HashMap<InstanceId, Instance>>,
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a record (the lifecycle service's job in production).
    pub async fn put(&self, instance: Instance) {
        self.instances
            .lock()
            .await
            .insert(instance.id.clone(), instance);
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn get_by_id(&self, id: &InstanceId) -> Result<Instance, StoreError> {
        self.instances
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, instance: Instance) -> Result<Instance, StoreError> {
        let mut instances = self.instances.lock().await;
        let Some(current) = instances.get_mut(&instance.id) else {
            return Err(StoreError::NotFound(instance.id.to_string()));
        };
        *current = instance.clone();
        Ok(instance)
    }

    async fn finish_history_sync(
        &self,
        id: &InstanceId,
        cycle_id: CycleId,
        status: HistorySyncStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Instance>, StoreError> {
        let mut instances = self.instances.lock().await;
        let Some(current) = instances.get_mut(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        if current.history_sync_cycle_id != Some(cycle_id) {
            return Ok(None);
        }
        if current.history_sync_status != status {
            current.finish_history_sync(status, at);
        }
        Ok(Some(current.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryHistorySyncStore {
    payloads: Mutex<Vec<HistorySyncPayload>>,
}

impl InMemoryHistorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<HistorySyncPayload> {
        self.payloads.lock().await.clone()
    }
}

#[async_trait]
impl HistorySyncStore for InMemoryHistorySyncStore {
    async fn create(&self, payload: HistorySyncPayload) -> Result<HistorySyncPayload, StoreError> {
        let mut payloads = self.payloads.lock().await;
        if payloads.iter().any(|p| p.id == payload.id) {
            return Err(StoreError::Conflict(format!(
                "history sync payload {} already exists",
                payload.id
            )));
        }
        payloads.push(payload.clone());
        Ok(payload)
    }

    async fn list_pending_by_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<HistorySyncPayload>, StoreError> {
        let payloads = self.payloads.lock().await;
        // push 順 = created_at 順
        Ok(payloads
            .iter()
            .filter(|p| &p.instance_id == instance_id && p.is_pending())
            .cloned()
            .collect())
    }

    async fn list_pending_by_cycle(
        &self,
        instance_id: &InstanceId,
        cycle_id: CycleId,
    ) -> Result<Vec<HistorySyncPayload>, StoreError> {
        let payloads = self.payloads.lock().await;
        Ok(payloads
            .iter()
            .filter(|p| {
                &p.instance_id == instance_id && p.cycle_id == Some(cycle_id) && p.is_pending()
            })
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: SyncPayloadId,
        status: SyncPayloadStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut payloads = self.payloads.lock().await;
        let Some(payload) = payloads.iter_mut().find(|p| p.id == id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        payload.status = status;
        payload.processed_at = processed_at;
        Ok(())
    }

    async fn delete_by_instance(&self, instance_id: &InstanceId) -> Result<(), StoreError> {
        self.payloads
            .lock()
            .await
            .retain(|p| &p.instance_id != instance_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstanceStatus, MessageKind, MessageStatus};
    use chrono::Duration;
    use ulid::Ulid;

    fn message(status: MessageStatus, created_at: DateTime<Utc>) -> Message {
        Message::new(
            MessageId::from_ulid(Ulid::new()),
            InstanceId::new("A"),
            "5511988887777",
            MessageKind::Text,
            "hi",
            status,
            created_at,
        )
    }

    #[tokio::test]
    async fn pending_returns_only_non_terminal_oldest_first() {
        let store = InMemoryMessageStore::new();
        let now = Utc::now();
        let newer = store
            .create(message(MessageStatus::Queued, now))
            .await
            .unwrap();
        let older = store
            .create(message(MessageStatus::Sending, now - Duration::seconds(5)))
            .await
            .unwrap();
        store
            .create(message(MessageStatus::Sent, now - Duration::seconds(9)))
            .await
            .unwrap();
        store
            .create(message(MessageStatus::Failed, now - Duration::seconds(9)))
            .await
            .unwrap();

        let pending = store.get_pending(50).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);

        assert_eq!(store.get_pending(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_refuses_regression_from_terminal() {
        let store = InMemoryMessageStore::new();
        let mut msg = store
            .create(message(MessageStatus::Sent, Utc::now()))
            .await
            .unwrap();
        msg.status = MessageStatus::Sending;
        let err = store.update(&msg).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(
            store.get(msg.id).await.unwrap().unwrap().status,
            MessageStatus::Sent
        );
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = InMemoryMessageStore::new();
        let msg = message(MessageStatus::Queued, Utc::now());
        store.create(msg.clone()).await.unwrap();
        assert!(matches!(
            store.create(msg).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let store = InMemoryInstanceStore::new();
        let err = store.get_by_id(&InstanceId::new("nope")).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("nope".into()));

        store
            .put(Instance::new(InstanceId::new("A"), InstanceStatus::Active))
            .await;
        assert!(store.get_by_id(&InstanceId::new("A")).await.is_ok());
    }

    #[tokio::test]
    async fn finishing_history_sync_requires_the_stored_cycle() {
        let store = InMemoryInstanceStore::new();
        let a = InstanceId::new("A");
        let ours = CycleId::from_ulid(Ulid::new());
        let newer = CycleId::from_ulid(Ulid::new());
        let mut instance = Instance::new(a.clone(), InstanceStatus::Active);
        instance.begin_history_sync(newer, Utc::now());
        store.put(instance).await;

        let stale = store
            .finish_history_sync(&a, ours, HistorySyncStatus::Completed, Utc::now())
            .await
            .unwrap();
        assert!(stale.is_none());
        let kept = store.get_by_id(&a).await.unwrap();
        assert_eq!(kept.history_sync_status, HistorySyncStatus::Running);
        assert_eq!(kept.history_sync_cycle_id, Some(newer));

        let done = store
            .finish_history_sync(&a, newer, HistorySyncStatus::Completed, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.history_sync_status, HistorySyncStatus::Completed);
        assert_eq!(store.get_by_id(&a).await.unwrap(), done);
    }

    #[tokio::test]
    async fn history_payloads_filter_by_cycle_and_purge_by_instance() {
        let store = InMemoryHistorySyncStore::new();
        let a = InstanceId::new("A");
        let cycle = CycleId::from_ulid(Ulid::new());
        let other_cycle = CycleId::from_ulid(Ulid::new());

        let first = HistorySyncPayload::pending(
            SyncPayloadId::from_ulid(Ulid::new()),
            a.clone(),
            "HistorySyncNotification",
            b"{}".to_vec(),
            Some(cycle),
            Utc::now(),
        );
        let second = HistorySyncPayload::pending(
            SyncPayloadId::from_ulid(Ulid::new()),
            a.clone(),
            "HistorySyncNotification",
            b"{}".to_vec(),
            Some(other_cycle),
            Utc::now(),
        );
        store.create(first.clone()).await.unwrap();
        store.create(second).await.unwrap();

        let in_cycle = store.list_pending_by_cycle(&a, cycle).await.unwrap();
        assert_eq!(in_cycle.len(), 1);
        assert_eq!(in_cycle[0].id, first.id);

        store
            .update_status(first.id, SyncPayloadStatus::Done, Some(Utc::now()))
            .await
            .unwrap();
        assert_eq!(store.list_pending_by_instance(&a).await.unwrap().len(), 1);

        store.delete_by_instance(&a).await.unwrap();
        assert!(store.all().await.is_empty());
    }
}

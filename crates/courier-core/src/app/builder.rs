//! GatewayBuilder - ゲートウェイの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - SessionGateway / MessageStore / InstanceStore は必須。無ければ build() が BuildError を返す
//!   （送信ごとのエラーではなく、構成のエラーとして起動時に落とす）
//! - GatewayConfig も build() 時に検証する
//! - それ以外（キュー、history store、processor、clock、id 生成）は開発用の既定値で埋める

use std::sync::Arc;

use tracing::debug;

use crate::app::dispatch::DispatchService;
use crate::app::history_sync::HistorySyncCoordinator;
use crate::app::outbox::Outbox;
use crate::config::{ConfigError, GatewayConfig};
use crate::impls::{InMemoryDeliveryQueue, InMemoryHistorySyncStore, ManualDownloadProcessor};
use crate::ports::{
    Clock, DeliveryQueue, HistorySyncProcessor, HistorySyncStore, IdGenerator, InstanceStore,
    MessageStore, SessionGateway, SystemClock, UlidGenerator,
};

/// BuildError はゲートウェイ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing session gateway. Every send needs one; wire it with `session_gateway()`.")]
    MissingSessionGateway,
    #[error("Missing message store. Wire it with `message_store()`.")]
    MissingMessageStore,
    #[error("Missing instance store. Wire it with `instance_store()`.")]
    MissingInstanceStore,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// # 使用例
/// ```ignore
/// let gateway = GatewayBuilder::new()
///     .config(config)
///     .session_gateway(sessions)
///     .message_store(messages)
///     .instance_store(instances)
///     .build()?;
/// ```
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    sessions: Option<Arc<dyn SessionGateway>>,
    messages: Option<Arc<dyn MessageStore>>,
    instances: Option<Arc<dyn InstanceStore>>,
    history: Option<Arc<dyn HistorySyncStore>>,
    queue: Option<Arc<dyn DeliveryQueue>>,
    processor: Option<Arc<dyn HistorySyncProcessor>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn session_gateway(mut self, sessions: Arc<dyn SessionGateway>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn message_store(mut self, messages: Arc<dyn MessageStore>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn instance_store(mut self, instances: Arc<dyn InstanceStore>) -> Self {
        self.instances = Some(instances);
        self
    }

    pub fn history_sync_store(mut self, history: Arc<dyn HistorySyncStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn delivery_queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn history_sync_processor(mut self, processor: Arc<dyn HistorySyncProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Gateway, BuildError> {
        self.config.validate()?;
        let sessions = self.sessions.ok_or(BuildError::MissingSessionGateway)?;
        let messages = self.messages.ok_or(BuildError::MissingMessageStore)?;
        let instances = self.instances.ok_or(BuildError::MissingInstanceStore)?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())) as Arc<dyn IdGenerator>);
        let queue = self.queue.unwrap_or_else(|| {
            debug!("no delivery queue wired, using in-memory queue");
            Arc::new(InMemoryDeliveryQueue::new()) as Arc<dyn DeliveryQueue>
        });
        let history = self.history.unwrap_or_else(|| {
            debug!("no history sync store wired, using in-memory store");
            Arc::new(InMemoryHistorySyncStore::new()) as Arc<dyn HistorySyncStore>
        });
        let processor = self
            .processor
            .unwrap_or_else(|| Arc::new(ManualDownloadProcessor) as Arc<dyn HistorySyncProcessor>);

        let dispatch = Arc::new(DispatchService::new(
            messages.clone(),
            instances.clone(),
            sessions,
            ids.clone(),
            clock.clone(),
            &self.config,
        ));
        let outbox = Arc::new(Outbox::new(
            dispatch.clone(),
            messages,
            queue,
            ids.clone(),
            clock.clone(),
            self.config.outbox.clone(),
        ));
        let history_sync = HistorySyncCoordinator::new(
            instances,
            history,
            processor,
            ids,
            clock,
            self.config.history_sync.clone(),
        );

        Ok(Gateway {
            dispatch,
            outbox,
            history_sync,
            config: self.config,
        })
    }
}

/// The wired gateway core.
pub struct Gateway {
    pub dispatch: Arc<DispatchService>,
    pub outbox: Arc<Outbox>,
    pub history_sync: HistorySyncCoordinator,
    pub config: GatewayConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dispatch::SendInput;
    use crate::app::payload::MessageContent;
    use crate::app::testing::{FakeGateway, FakeSession};
    use crate::domain::{Instance, InstanceId, InstanceStatus, MessageStatus};
    use crate::impls::{InMemoryInstanceStore, InMemoryMessageStore};

    fn complete() -> (GatewayBuilder, Arc<InMemoryInstanceStore>) {
        let instances = Arc::new(InMemoryInstanceStore::new());
        let builder = GatewayBuilder::new()
            .session_gateway(FakeGateway::ready(FakeSession::new()))
            .message_store(Arc::new(InMemoryMessageStore::new()))
            .instance_store(instances.clone());
        (builder, instances)
    }

    #[tokio::test]
    async fn built_gateway_sends() {
        let (builder, instances) = complete();
        instances
            .put(Instance::new(InstanceId::new("A"), InstanceStatus::Active))
            .await;
        let gateway = builder.build().unwrap();

        let message = gateway
            .dispatch
            .send(SendInput::new(
                InstanceId::new("A"),
                "5511988887777",
                MessageContent::text("hi"),
            ))
            .await
            .unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
    }

    #[test]
    fn missing_session_gateway_fails_fast() {
        let result = GatewayBuilder::new()
            .message_store(Arc::new(InMemoryMessageStore::new()))
            .instance_store(Arc::new(InMemoryInstanceStore::new()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingSessionGateway)));
    }

    #[test]
    fn missing_stores_fail_fast() {
        let no_messages = GatewayBuilder::new()
            .session_gateway(FakeGateway::ready(FakeSession::new()))
            .instance_store(Arc::new(InMemoryInstanceStore::new()))
            .build();
        let no_instances = GatewayBuilder::new()
            .session_gateway(FakeGateway::ready(FakeSession::new()))
            .message_store(Arc::new(InMemoryMessageStore::new()))
            .build();
        assert!(matches!(no_messages, Err(BuildError::MissingMessageStore)));
        assert!(matches!(no_instances, Err(BuildError::MissingInstanceStore)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = GatewayConfig::default();
        config.outbox.workers = 0;
        let (builder, _) = complete();
        let result = builder.config(config).build();
        assert!(matches!(result, Err(BuildError::Config(ConfigError::Invalid(_)))));
    }
}

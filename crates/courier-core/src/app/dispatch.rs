//! DispatchService - 1 回の送信をオーケストレーションする
//!
//! # フロー（すべて逐次）
//! 1. Instance を読み、active でなければ `NotConnected`
//! 2. SessionGateway からセッションを取得（失敗時は Instance を error に降格）
//! 3. ログインしていなければ 2 と同じ扱い
//! 4. readiness gate（最大 10 秒、2 秒を過ぎたら presence probe 1 回）
//! 5. 宛先の解決
//! 6. 内容の検証、メディアなら upload、OutboundMessage の組み立て
//! 7. status=sending で Message を永続化（送信前に書く）
//! 8. 送信し、sent / failed をベストエフォートで永続化
//!
//! サービス全体で共有する可変状態は持たないので、複数の呼び出し元
//! （API と outbox worker）から並行に呼べます。

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::app::payload::{MessageContent, SendRequest, build_outbound};
use crate::app::readiness::wait_until_ready;
use crate::app::resolver::RecipientResolver;
use crate::app::secondary::secondary_effect;
use crate::config::{DispatchConfig, GatewayConfig};
use crate::domain::{
    DispatchError, InstanceId, InstanceStatus, Message, MessageId, MessageStatus,
    QueueEvent, SendFailure, StoreError,
};
use crate::ports::{Clock, IdGenerator, InstanceStore, MessageStore, SessionGateway};

/// One send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendInput {
    pub instance_id: InstanceId,
    pub to: String,
    pub content: MessageContent,
    /// Idempotency / correlation key. Queued sends carry the event id here.
    pub message_id: Option<MessageId>,
}

impl SendInput {
    pub fn new(instance_id: InstanceId, to: impl Into<String>, content: MessageContent) -> Self {
        Self {
            instance_id,
            to: to.into(),
            content,
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    /// Build from the flat API shape; an unknown `type` is rejected here.
    pub fn from_request(
        instance_id: InstanceId,
        to: impl Into<String>,
        request: SendRequest,
    ) -> Result<Self, DispatchError> {
        Ok(Self::new(
            instance_id,
            to,
            MessageContent::from_request(request)?,
        ))
    }

    pub fn from_event(event: &QueueEvent) -> Result<Self, DispatchError> {
        Ok(Self::new(
            event.instance_id.clone(),
            event.to(),
            MessageContent::from_event(event)?,
        )
        .with_message_id(event.id))
    }
}

pub struct DispatchService {
    messages: Arc<dyn MessageStore>,
    instances: Arc<dyn InstanceStore>,
    sessions: Arc<dyn SessionGateway>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    resolver: RecipientResolver,
    config: DispatchConfig,
}

impl DispatchService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        instances: Arc<dyn InstanceStore>,
        sessions: Arc<dyn SessionGateway>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            messages,
            instances,
            sessions,
            ids,
            clock,
            resolver: RecipientResolver::new(config.resolver.clone()),
            config: config.dispatch.clone(),
        }
    }

    /// Send one message.
    ///
    /// A transmission failure still returns the (failed) record inside the
    /// `SendFailure`. Idempotent on `message_id`: a terminal record is returned
    /// untouched.
    #[instrument(
        skip_all,
        fields(instance_id = %input.instance_id, kind = %input.content.kind())
    )]
    pub async fn send(&self, input: SendInput) -> Result<Message, SendFailure> {
        let SendInput {
            instance_id,
            to,
            content,
            message_id,
        } = input;
        if instance_id.is_empty() || to.is_empty() {
            return Err(DispatchError::InvalidPayload("instance_id and to are required".into()).into());
        }

        let existing = match message_id {
            Some(id) => self.messages.get(id).await?,
            None => None,
        };
        if let Some(message) = &existing
            && message.status.is_terminal()
        {
            info!(message_id = %message.id, status = %message.status, "message already settled, skipping send");
            return Ok(message.clone());
        }

        // 1
        let instance = match self.instances.get_by_id(&instance_id).await {
            Ok(instance) => instance,
            Err(StoreError::NotFound(_)) => {
                return Err(DispatchError::NotFound(instance_id).into());
            }
            Err(e) => return Err(e.into()),
        };
        if !instance.is_active() {
            return Err(DispatchError::NotConnected(instance_id).into());
        }

        // 2, 3
        let session = match self.sessions.session(&instance_id).await {
            Ok(session) if session.is_logged_in() => session,
            Ok(_) => {
                warn!("session is not logged in");
                self.mark_instance_error(&instance_id).await;
                return Err(DispatchError::NotConnected(instance_id).into());
            }
            Err(e) => {
                warn!(error = %e, "session unavailable from gateway");
                self.mark_instance_error(&instance_id).await;
                return Err(DispatchError::NotConnected(instance_id).into());
            }
        };

        // 4
        wait_until_ready(
            self.sessions.as_ref(),
            session.as_ref(),
            &instance_id,
            &self.config,
        )
        .await?;

        // 5
        let address = self
            .resolver
            .resolve(session.as_ref(), &to)
            .await
            .map_err(|e| DispatchError::InvalidAddress(e.to_string()))?;

        // 6
        content.validate()?;
        let upload = match (content.media(), content.media_category()) {
            (Some(media), Some(category)) => Some(
                session
                    .upload(&media.data, category)
                    .await
                    .map_err(DispatchError::Upload)?,
            ),
            _ => None,
        };
        let outbound = build_outbound(&content, upload, self.clock.now(), &mut rand::thread_rng())?;

        // 7
        let now = self.clock.now();
        let mut message = match existing {
            Some(mut message) => {
                message.payload = outbound.summary();
                message.transition(MessageStatus::Sending, now).map_err(StoreError::from)?;
                self.messages.update(&message).await?;
                message
            }
            None => {
                let id = message_id.unwrap_or_else(|| self.ids.generate_message_id());
                let message = Message::new(
                    id,
                    instance_id.clone(),
                    to.clone(),
                    content.kind(),
                    outbound.summary(),
                    MessageStatus::Sending,
                    now,
                );
                self.messages.create(message).await?
            }
        };

        // 8
        match session.send(&address, &outbound).await {
            Ok(()) => {
                self.settle(&mut message, MessageStatus::Sent).await;
                info!(message_id = %message.id, %address, "message sent");
                Ok(message)
            }
            Err(e) => {
                warn!(message_id = %message.id, %address, error = %e, "transmission failed");
                self.settle(&mut message, MessageStatus::Failed).await;
                Err(SendFailure::with_message(DispatchError::Transmission(e), message))
            }
        }
    }

    /// Messages of one instance, oldest first.
    pub async fn list(&self, instance_id: &InstanceId) -> Result<Vec<Message>, StoreError> {
        self.messages.list_by_instance(instance_id).await
    }

    /// Mark a not-yet-settled record failed. Settled or unknown records are
    /// returned as they are.
    pub async fn fail_pending(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let Some(mut message) = self.messages.get(id).await? else {
            return Ok(None);
        };
        if message.status.is_terminal() {
            return Ok(Some(message));
        }
        message.transition(MessageStatus::Failed, self.clock.now())?;
        self.messages.update(&message).await?;
        Ok(Some(message))
    }

    async fn settle(&self, message: &mut Message, status: MessageStatus) {
        if let Err(e) = message.transition(status, self.clock.now()) {
            warn!(error = %e, "refusing status regression");
            return;
        }
        secondary_effect("persist_message_status", self.messages.update(message)).await;
    }

    // session 取得の間に history sync 側が書いた列を潰さないよう、読み直してから降格する
    async fn mark_instance_error(&self, instance_id: &InstanceId) {
        secondary_effect("mark_instance_error", async {
            let mut instance = self.instances.get_by_id(instance_id).await?;
            instance.status = InstanceStatus::Error;
            self.instances.update(instance).await
        })
        .await;
    }
}

//! QueueEvent - outbox キューを流れる送信意図
//!
//! キュー自身が耐久性を持つので、このクレートでは永続化しません。
//! stuck-recovery が Message から再構築することもあります。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{InstanceId, MessageId};
use super::message::Message;

pub const PAYLOAD_TO: &str = "to";
pub const PAYLOAD_TEXT: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Same value as the Message id; doubles as the idempotency key.
    pub id: MessageId,
    pub instance_id: InstanceId,
    /// API-level type string ("text", "image", ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl QueueEvent {
    pub fn new(
        id: MessageId,
        instance_id: InstanceId,
        kind: impl Into<String>,
        to: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut payload = Map::new();
        payload.insert(PAYLOAD_TO.to_string(), Value::String(to.to_string()));
        payload.insert(PAYLOAD_TEXT.to_string(), Value::String(text.to_string()));
        Self {
            id,
            instance_id,
            kind: kind.into(),
            payload,
            created_at,
        }
    }

    /// Rebuild the event for a message found stuck in the store.
    pub fn from_message(message: &Message) -> Self {
        Self::new(
            message.id,
            message.instance_id.clone(),
            message.kind.as_str(),
            &message.to,
            &message.payload,
            message.created_at,
        )
    }

    pub fn to(&self) -> &str {
        self.str_field(PAYLOAD_TO)
    }

    pub fn text(&self) -> &str {
        self.str_field(PAYLOAD_TEXT)
    }

    // 型が合わない場合は空文字として扱う
    fn str_field(&self, key: &str) -> &str {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageKind, MessageStatus};
    use ulid::Ulid;

    #[test]
    fn rebuilt_event_carries_message_fields() {
        let msg = Message::new(
            MessageId::from_ulid(Ulid::new()),
            InstanceId::new("A"),
            "5511988887777",
            MessageKind::Text,
            "hi",
            MessageStatus::Sending,
            Utc::now(),
        );
        let event = QueueEvent::from_message(&msg);
        assert_eq!(event.id, msg.id);
        assert_eq!(event.kind, "text");
        assert_eq!(event.to(), "5511988887777");
        assert_eq!(event.text(), "hi");
        assert_eq!(event.created_at, msg.created_at);
    }

    #[test]
    fn non_string_fields_read_as_empty() {
        let mut event = QueueEvent::new(
            MessageId::from_ulid(Ulid::new()),
            InstanceId::new("A"),
            "text",
            "123",
            "x",
            Utc::now(),
        );
        event.payload.insert(PAYLOAD_TEXT.into(), Value::from(5));
        assert_eq!(event.text(), "");
    }
}

//! Message record and its status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::{InstanceId, MessageId};

/// Delivery status of a message.
///
/// State transitions:
/// - Queued -> Sending -> Sent
/// - Queued -> Sending -> Failed
/// - Queued -> Failed (rejected before transmission)
///
/// Sent / Failed are terminal: a record never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Queued,
    Sending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed)
    }

    /// Re-applying the current status is always allowed (idempotent writes).
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        if self == next {
            return true;
        }
        match self {
            MessageStatus::Queued => true,
            MessageStatus::Sending => next.is_terminal(),
            MessageStatus::Sent | MessageStatus::Failed => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Queued => "queued",
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The API-level message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl MessageKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageKind::Text),
            "image" => Some(MessageKind::Image),
            "video" => Some(MessageKind::Video),
            "audio" => Some(MessageKind::Audio),
            "document" => Some(MessageKind::Document),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("message {id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub id: MessageId,
    pub from: MessageStatus,
    pub to: MessageStatus,
}

/// A durable message record.
///
/// `payload` is a summary, not the wire content: the raw text,
/// `media:<mime>` or `document:<filename>:<mime>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub instance_id: InstanceId,
    pub to: String,
    pub kind: MessageKind,
    pub payload: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        id: MessageId,
        instance_id: InstanceId,
        to: impl Into<String>,
        kind: MessageKind,
        payload: impl Into<String>,
        status: MessageStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            instance_id,
            to: to.into(),
            kind,
            payload: payload.into(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, refusing any regression out of a terminal status.
    pub fn transition(
        &mut self,
        next: MessageStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

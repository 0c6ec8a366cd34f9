//! Status - メッセージ一覧の status 集計

use serde::{Deserialize, Serialize};

use crate::domain::{Message, MessageStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCounts {
    pub queued: usize,
    pub sending: usize,
    pub sent: usize,
    pub failed: usize,
}

impl MessageCounts {
    pub fn from_messages<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Self {
        let mut counts = Self::default();
        for message in messages {
            match message.status {
                MessageStatus::Queued => counts.queued += 1,
                MessageStatus::Sending => counts.sending += 1,
                MessageStatus::Sent => counts.sent += 1,
                MessageStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Rows the recovery sweep would still pick up.
    pub fn in_flight(&self) -> usize {
        self.queued + self.sending
    }

    pub fn total(&self) -> usize {
        self.in_flight() + self.sent + self.failed
    }
}

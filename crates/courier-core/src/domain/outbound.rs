//! OutboundMessage - Transport Session に渡す送信直前のメッセージ
//!
//! メディア系は upload 結果（locator / keys / hashes / length）を参照する envelope です。

use serde::{Deserialize, Serialize};

use super::message::MessageKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEnvelope {
    pub url: String,
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub file_enc_sha256: Vec<u8>,
    pub file_sha256: Vec<u8>,
    pub file_length: u64,
    pub mime_type: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEnvelope {
    pub media: MediaEnvelope,
    /// Voice note ("push to talk").
    pub ptt: bool,
    pub seconds: u32,
    /// 64 amplitude samples, present only for voice notes.
    pub waveform: Option<Vec<u8>>,
    pub streaming_sidecar: Option<Vec<u8>>,
    pub media_key_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    pub media: MediaEnvelope,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundMessage {
    Text(String),
    Image(MediaEnvelope),
    Video(MediaEnvelope),
    Audio(AudioEnvelope),
    Document(DocumentEnvelope),
}

impl OutboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            OutboundMessage::Text(_) => MessageKind::Text,
            OutboundMessage::Image(_) => MessageKind::Image,
            OutboundMessage::Video(_) => MessageKind::Video,
            OutboundMessage::Audio(_) => MessageKind::Audio,
            OutboundMessage::Document(_) => MessageKind::Document,
        }
    }

    /// Summary stored as `Message::payload`.
    pub fn summary(&self) -> String {
        match self {
            OutboundMessage::Text(body) => body.clone(),
            OutboundMessage::Image(media) | OutboundMessage::Video(media) => {
                format!("media:{}", media.mime_type)
            }
            OutboundMessage::Audio(audio) => format!("media:{}", audio.media.mime_type),
            OutboundMessage::Document(doc) => {
                format!("document:{}:{}", doc.file_name, doc.media.mime_type)
            }
        }
    }
}

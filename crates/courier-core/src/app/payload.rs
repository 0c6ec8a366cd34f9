//! Payload - API レベルの送信内容と、送信直前の OutboundMessage の組み立て
//!
//! `type` 文字列の分岐は入口（`MessageContent::from_request`）の一度きりで、
//! 以降は `MessageContent` の網羅的な match で扱います。

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AudioEnvelope, DispatchError, DocumentEnvelope, MediaEnvelope, MessageKind, OutboundMessage,
    QueueEvent,
};
use crate::ports::{MediaCategory, UploadResult};

/// MIME forced onto voice notes sent in an ogg container.
pub const VOICE_NOTE_MIME: &str = "audio/ogg; codecs=opus";
const OGG_CONTAINER: &str = "audio/ogg";

pub const WAVEFORM_LEN: usize = 64;
pub const SIDECAR_LEN: usize = 16;
const WAVEFORM_PEAK: f64 = 50.0;
const WAVEFORM_JITTER: f64 = 40.0;

const DEFAULT_DOCUMENT_NAME: &str = "document";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInput {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl MediaInput {
    pub fn new(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// What the caller asked to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    Text {
        body: String,
    },
    Image {
        media: MediaInput,
        caption: Option<String>,
    },
    Video {
        media: MediaInput,
        caption: Option<String>,
    },
    Audio {
        media: MediaInput,
        /// Voice note.
        ptt: bool,
        seconds: u32,
    },
    Document {
        media: MediaInput,
        file_name: Option<String>,
        caption: Option<String>,
    },
}

impl MessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        MessageContent::Text { body: body.into() }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MessageContent::Text { .. } => MessageKind::Text,
            MessageContent::Image { .. } => MessageKind::Image,
            MessageContent::Video { .. } => MessageKind::Video,
            MessageContent::Audio { .. } => MessageKind::Audio,
            MessageContent::Document { .. } => MessageKind::Document,
        }
    }

    pub fn media(&self) -> Option<&MediaInput> {
        match self {
            MessageContent::Text { .. } => None,
            MessageContent::Image { media, .. }
            | MessageContent::Video { media, .. }
            | MessageContent::Audio { media, .. }
            | MessageContent::Document { media, .. } => Some(media),
        }
    }

    /// Upload category, `None` for text.
    pub fn media_category(&self) -> Option<MediaCategory> {
        match self {
            MessageContent::Text { .. } => None,
            MessageContent::Image { .. } => Some(MediaCategory::Image),
            MessageContent::Video { .. } => Some(MediaCategory::Video),
            MessageContent::Audio { .. } => Some(MediaCategory::Audio),
            MessageContent::Document { .. } => Some(MediaCategory::Document),
        }
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        match self {
            MessageContent::Text { body } if body.is_empty() => Err(
                DispatchError::InvalidPayload("text message requires a body".into()),
            ),
            MessageContent::Text { .. } => Ok(()),
            other => match other.media() {
                Some(media) if !media.data.is_empty() => Ok(()),
                _ => Err(DispatchError::InvalidPayload(format!(
                    "{} message requires media content",
                    other.kind()
                ))),
            },
        }
    }

    /// Convert the flat API shape. Unknown `type` values are rejected here.
    pub fn from_request(req: SendRequest) -> Result<Self, DispatchError> {
        let SendRequest {
            kind,
            text,
            media_data,
            mime_type,
            caption,
            ptt,
            seconds,
            file_name,
        } = req;
        let parsed = MessageKind::parse(kind.trim())
            .ok_or_else(|| DispatchError::UnsupportedMediaType(kind.clone()))?;
        let media = MediaInput::new(media_data, mime_type);
        Ok(match parsed {
            MessageKind::Text => MessageContent::Text { body: text },
            MessageKind::Image => MessageContent::Image { media, caption },
            MessageKind::Video => MessageContent::Video { media, caption },
            MessageKind::Audio => MessageContent::Audio {
                media,
                ptt,
                seconds,
            },
            MessageKind::Document => MessageContent::Document {
                media,
                file_name: file_name.filter(|n| !n.trim().is_empty()),
                caption,
            },
        })
    }

    /// Content of a queued event. Events carry no media bytes, so media kinds
    /// come out empty and fail validation.
    pub fn from_event(event: &QueueEvent) -> Result<Self, DispatchError> {
        Self::from_request(SendRequest {
            kind: event.kind.clone(),
            text: event.text().to_string(),
            ..SendRequest::default()
        })
    }
}

/// The flat request shape API adapters hand over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub media_data: Vec<u8>,
    pub mime_type: String,
    pub caption: Option<String>,
    pub ptt: bool,
    pub seconds: u32,
    pub file_name: Option<String>,
}

/// 64 samples: a centred parabola (peak 50) plus up to 40 of jitter.
pub fn voice_note_waveform<R: Rng + ?Sized>(rng: &mut R) -> Vec<u8> {
    let center = (WAVEFORM_LEN as f64 - 1.0) / 2.0;
    let half = WAVEFORM_LEN as f64 / 2.0;
    (0..WAVEFORM_LEN)
        .map(|i| {
            let norm = (i as f64 - center).abs() / half;
            let envelope = (1.0 - norm * norm).max(0.0);
            let value = envelope * WAVEFORM_PEAK + rng.gen_range(0.0..WAVEFORM_JITTER);
            value.clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// `document` plus the extension registered for `mime`; bare `document`
/// for unknown types.
pub fn document_file_name(mime: &str) -> String {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/zip" => "zip",
        "application/json" => "json",
        "text/plain" => "txt",
        "text/csv" => "csv",
        _ => return DEFAULT_DOCUMENT_NAME.to_string(),
    };
    format!("{DEFAULT_DOCUMENT_NAME}.{ext}")
}

fn envelope(upload: UploadResult, mime_type: String, caption: Option<String>) -> MediaEnvelope {
    MediaEnvelope {
        url: upload.url,
        direct_path: upload.direct_path,
        media_key: upload.media_key,
        file_enc_sha256: upload.file_enc_sha256,
        file_sha256: upload.file_sha256,
        file_length: upload.file_length,
        mime_type,
        caption,
    }
}

/// Turn validated content plus its upload result into the wire-ready message.
pub fn build_outbound<R: Rng + ?Sized>(
    content: &MessageContent,
    upload: Option<UploadResult>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<OutboundMessage, DispatchError> {
    if let MessageContent::Text { body } = content {
        return Ok(OutboundMessage::Text(body.clone()));
    }
    let upload = upload.ok_or_else(|| {
        DispatchError::InvalidPayload(format!("{} content was not uploaded", content.kind()))
    })?;

    Ok(match content {
        MessageContent::Text { body } => OutboundMessage::Text(body.clone()),
        MessageContent::Image { media, caption } => {
            OutboundMessage::Image(envelope(upload, media.mime_type.clone(), caption.clone()))
        }
        MessageContent::Video { media, caption } => {
            OutboundMessage::Video(envelope(upload, media.mime_type.clone(), caption.clone()))
        }
        MessageContent::Audio {
            media,
            ptt,
            seconds,
        } => {
            let mime_type = if *ptt && media.mime_type.contains(OGG_CONTAINER) {
                VOICE_NOTE_MIME.to_string()
            } else {
                media.mime_type.clone()
            };
            let (waveform, streaming_sidecar) = if *ptt {
                (Some(voice_note_waveform(rng)), Some(vec![0u8; SIDECAR_LEN]))
            } else {
                (None, None)
            };
            OutboundMessage::Audio(AudioEnvelope {
                media: envelope(upload, mime_type, None),
                ptt: *ptt,
                seconds: *seconds,
                waveform,
                streaming_sidecar,
                media_key_timestamp: now.timestamp(),
            })
        }
        MessageContent::Document {
            media,
            file_name,
            caption,
        } => OutboundMessage::Document(DocumentEnvelope {
            file_name: file_name
                .clone()
                .unwrap_or_else(|| document_file_name(&media.mime_type)),
            media: envelope(upload, media.mime_type.clone(), caption.clone()),
        }),
    })
}

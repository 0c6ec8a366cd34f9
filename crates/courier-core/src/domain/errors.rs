//! Errors - エラー型と分類
//!
//! `ErrorKind` は運用上の分類で、outbox が「リトライすべきか」を
//! 文字列比較なしで判断するために使います。

use thiserror::Error;

use super::ids::InstanceId;
use super::message::{Message, TransitionError};

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（時間をおいて再送すれば通る可能性がある）
/// - Permanent: 恒久的なエラー（入力が悪いので再送しても無意味）
/// - Infrastructure: ストアなど周辺インフラの障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Failure reported by a persistence collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<TransitionError> for StoreError {
    fn from(e: TransitionError) -> Self {
        StoreError::Conflict(e.to_string())
    }
}

/// Failure reported by a transport session or the session gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("session is not logged in")]
    NotLoggedIn,

    #[error("transport timed out")]
    Timeout,

    #[error("rejected by remote: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

/// Structural problems with a destination string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("destination is empty")]
    Empty,

    #[error("malformed destination: {0}")]
    Malformed(String),
}

/// Errors surfaced by one dispatch (send) call.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("instance not found: {0}")]
    NotFound(InstanceId),

    #[error("instance not connected: {0}")]
    NotConnected(InstanceId),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("session unavailable for encryption on instance {0}, try again shortly")]
    SessionUnavailable(InstanceId),

    #[error("media upload failed: {0}")]
    Upload(#[source] TransportError),

    #[error("transmission failed: {0}")]
    Transmission(#[source] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::InvalidPayload(_)
            | DispatchError::NotFound(_)
            | DispatchError::InvalidAddress(_)
            | DispatchError::UnsupportedMediaType(_) => ErrorKind::Permanent,
            DispatchError::NotConnected(_)
            | DispatchError::SessionUnavailable(_)
            | DispatchError::Upload(_)
            | DispatchError::Transmission(_) => ErrorKind::Transient,
            DispatchError::Store(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Permanent
    }
}

/// A failed send: the error plus the message record when one had already been
/// persisted (transmission failures).
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SendFailure {
    #[source]
    pub error: DispatchError,
    pub message: Option<Message>,
}

impl SendFailure {
    pub fn with_message(error: DispatchError, message: Message) -> Self {
        Self {
            error,
            message: Some(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<DispatchError> for SendFailure {
    fn from(error: DispatchError) -> Self {
        Self {
            error,
            message: None,
        }
    }
}

impl From<StoreError> for SendFailure {
    fn from(error: StoreError) -> Self {
        DispatchError::from(error).into()
    }
}

#[derive(Debug, Error)]
pub enum HistorySyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("payload processing failed: {0}")]
    Processor(String),
}

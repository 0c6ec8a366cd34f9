//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! ゲートウェイ自身が発行する ID（Message / Cycle / SyncPayload）は ULID を使います。
//! 生成順にソートでき、複数プロセスから調整なしで発行できます。
//!
//! `Id<T>` は PhantomData のマーカー型で種類を区別するため、
//! `MessageId` と `CycleId` を取り違えるとコンパイルエラーになります。
//!
//! `InstanceId` だけは外部のインスタンス管理サービスが払い出す不透明な文字列なので、
//! ULID ではなく String の newtype です。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"msg-", "cycle-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse the `Display` form back (`msg-01H...`). The bare ULID is accepted too.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).ok().map(Self::from_ulid)
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Message のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageMarker {}

impl IdMarker for MessageMarker {
    fn prefix() -> &'static str {
        "msg-"
    }
}

/// History sync cycle のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CycleMarker {}

impl IdMarker for CycleMarker {
    fn prefix() -> &'static str {
        "cycle-"
    }
}

/// History sync payload のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncPayloadMarker {}

impl IdMarker for SyncPayloadMarker {
    fn prefix() -> &'static str {
        "hsp-"
    }
}

/// Identifier of a Message record (also the outbox event id / idempotency key).
pub type MessageId = Id<MessageMarker>;

/// Identifier of one history sync cycle of an instance.
pub type CycleId = Id<CycleMarker>;

/// Identifier of a persisted history sync notification.
pub type SyncPayloadId = Id<SyncPayloadMarker>;

/// Identifier of an Instance (one tenant connection), issued outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

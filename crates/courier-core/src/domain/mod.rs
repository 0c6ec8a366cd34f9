//! Domain model (IDs, records, status machines, errors).
//!
//! このモジュールは ports / app に依存しません。
//! 永続化やセッションの詳細を知らず、「形」と「状態遷移」だけを定義します。

pub mod address;
pub mod errors;
pub mod event;
pub mod history_sync;
pub mod ids;
pub mod instance;
pub mod message;
pub mod outbound;

pub use self::address::NetworkAddress;
pub use self::errors::{
    AddressError, DispatchError, ErrorKind, HistorySyncError, QueueError, SendFailure, StoreError,
    TransportError,
};
pub use self::event::QueueEvent;
pub use self::history_sync::{HistorySyncPayload, SyncNotification, SyncPayloadStatus};
pub use self::ids::{CycleId, InstanceId, MessageId, SyncPayloadId};
pub use self::instance::{HistorySyncStatus, Instance, InstanceStatus};
pub use self::message::{Message, MessageKind, MessageStatus, TransitionError};
pub use self::outbound::{AudioEnvelope, DocumentEnvelope, MediaEnvelope, OutboundMessage};

//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。各 trait は外部の協調者
//! （永続化・キュー・リモートセッション）へのインターフェースで、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - MessageStore が source of truth（正本）
//! - DeliveryQueue はベストエフォートの配送（送信意図のみ）
//! - SessionGateway / TransportSession の中身（プロトコル・暗号）は関知しない

pub mod clock;
pub mod delivery_queue;
pub mod history_sync_store;
pub mod id_generator;
pub mod instance_store;
pub mod message_store;
pub mod session;
pub mod sync_processor;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::delivery_queue::DeliveryQueue;
pub use self::history_sync_store::HistorySyncStore;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::instance_store::InstanceStore;
pub use self::message_store::MessageStore;
pub use self::session::{
    ExistenceResult, MediaCategory, SessionGateway, TransportSession, UploadResult,
};
pub use self::sync_processor::HistorySyncProcessor;

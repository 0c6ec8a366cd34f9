//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryDeliveryQueue**: 開発用の配送キュー
//! - **InMemoryMessageStore / InMemoryInstanceStore / InMemoryHistorySyncStore**: 開発用のストア
//! - **ManualDownloadProcessor**: history sync payload の既定 processor（download しない）
//!
//! 本番用のストア・キュー実装は別クレートに置きます。

pub mod inmem_delivery;
pub mod manual_download;
pub mod memory_store;

pub use self::inmem_delivery::InMemoryDeliveryQueue;
pub use self::manual_download::ManualDownloadProcessor;
pub use self::memory_store::{InMemoryHistorySyncStore, InMemoryInstanceStore, InMemoryMessageStore};

//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてゲートウェイのロジックを実装します。
//!
//! # 主要コンポーネント
//! - **GatewayBuilder**: 構築とワイヤリング（必須の協調者が無ければ起動時に失敗）
//! - **RecipientResolver**: 宛先の正規化と existence probe
//! - **DispatchService**: 1 回の送信（readiness gate → 解決 → upload → 送信 → 永続化）
//! - **Outbox / OutboxWorkerPool**: キュー経由の送信と worker プール
//! - **RecoverySweep**: stuck な Message の再投入
//! - **HistorySyncCoordinator**: instance ごとの history sync cycle
//! - **CycleRegistry**: instance → キャンセルハンドルの表（唯一の共有可変状態）

pub mod builder;
pub mod dispatch;
pub mod history_sync;
pub mod outbox;
pub mod payload;
pub mod readiness;
pub mod recovery;
pub mod registry;
pub mod resolver;
pub mod secondary;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Gateway, GatewayBuilder};
pub use self::dispatch::{DispatchService, SendInput};
pub use self::history_sync::HistorySyncCoordinator;
pub use self::outbox::{EnqueueInput, Outbox, OutboxWorkerPool};
pub use self::payload::{MediaInput, MessageContent, SendRequest};
pub use self::recovery::RecoverySweep;
pub use self::registry::{CycleHandle, CycleRegistry};
pub use self::resolver::RecipientResolver;
pub use self::secondary::secondary_effect;
pub use self::status::MessageCounts;

//! HistorySyncProcessor port - pending な history sync payload の処理
//!
//! 現在の構成（manual download モード）では何もしない実装が既定です。
//! 後から「保留した download の再生」を差し込むための拡張点として残しています。

use async_trait::async_trait;

use crate::domain::{HistorySyncError, HistorySyncPayload};

#[async_trait]
pub trait HistorySyncProcessor: Send + Sync {
    /// `Ok` marks the payload done; `Err` leaves it pending.
    async fn process(&self, payload: &HistorySyncPayload) -> Result<(), HistorySyncError>;
}

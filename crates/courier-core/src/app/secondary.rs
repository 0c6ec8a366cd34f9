//! secondary_effect - 「主結果は副作用の成否に関係なく返す」を呼び出し側で明示する
//!
//! インスタンス状態の降格や、送信済みメッセージの status 永続化などは
//! 失敗してもログに残すだけで、呼び出し元の結果は変えません。

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Run a best-effort bookkeeping step. Failures are logged at `warn` and
/// swallowed; the value is returned when it succeeded.
pub async fn secondary_effect<T, E, F>(op: &'static str, effect: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match effect.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(op, error = %e, "secondary effect failed, keeping primary result");
            None
        }
    }
}

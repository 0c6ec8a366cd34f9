//! Readiness gate - セッションの暗号素材が揃うまで待つ
//!
//! `ready_timeout` まで `ready_poll_interval` ごとに確認し、
//! `presence_probe_after` を過ぎても揃わなければ presence probe を一度だけ送ります。
//! probe の失敗は致命的ではありません。

use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::app::secondary::secondary_effect;
use crate::config::DispatchConfig;
use crate::domain::{DispatchError, InstanceId};
use crate::ports::{SessionGateway, TransportSession};

pub async fn wait_until_ready(
    gateway: &dyn SessionGateway,
    session: &dyn TransportSession,
    instance_id: &InstanceId,
    config: &DispatchConfig,
) -> Result<(), DispatchError> {
    let start = Instant::now();
    let deadline = start + config.ready_timeout();
    let mut probed = false;

    loop {
        if gateway.is_session_ready(instance_id) {
            if probed {
                debug!(%instance_id, waited_ms = start.elapsed().as_millis() as u64, "session became ready");
            }
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        if !probed && now.duration_since(start) >= config.presence_probe_after() {
            probed = true;
            debug!(%instance_id, "session not ready, sending presence probe");
            secondary_effect("presence_probe", session.send_presence_probe()).await;
        }
        sleep_until((now + config.ready_poll_interval()).min(deadline)).await;
    }

    warn!(%instance_id, timeout_ms = config.ready_timeout_ms, "session not ready before timeout");
    Err(DispatchError::SessionUnavailable(instance_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeGateway, FakeSession};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn immediate_readiness_sends_no_probe() {
        let session = FakeSession::new();
        let gateway = FakeGateway::ready(session.clone());

        let start = Instant::now();
        wait_until_ready(
            gateway.as_ref(),
            session.as_ref(),
            &InstanceId::new("A"),
            &DispatchConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(session.presence_probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_within_two_seconds_needs_no_probe() {
        let session = FakeSession::new();
        let gateway = FakeGateway::ready_after(session.clone(), 3);

        let start = Instant::now();
        wait_until_ready(
            gateway.as_ref(),
            session.as_ref(),
            &InstanceId::new("A"),
            &DispatchConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(1_500));
        assert_eq!(session.presence_probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_convergence_gets_exactly_one_probe() {
        let session = FakeSession::new();
        // 失敗しても待ち続ける
        session.fail_presence.store(true, Ordering::SeqCst);
        let gateway = FakeGateway::ready_after(session.clone(), 10);

        wait_until_ready(
            gateway.as_ref(),
            session.as_ref(),
            &InstanceId::new("A"),
            &DispatchConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(session.presence_probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_times_out_at_ten_seconds() {
        let session = FakeSession::new();
        let gateway = FakeGateway::never_ready(session.clone());

        let start = Instant::now();
        let err = wait_until_ready(
            gateway.as_ref(),
            session.as_ref(),
            &InstanceId::new("A"),
            &DispatchConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DispatchError::SessionUnavailable(_)));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(session.presence_probes.load(Ordering::SeqCst), 1);
        // 0ms から 10s まで 500ms 刻み
        assert_eq!(gateway.ready_polls.load(Ordering::SeqCst), 21);
    }
}

use async_trait::async_trait;
use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{Duration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use courier_core::app::{
    EnqueueInput, GatewayBuilder, MediaInput, MessageContent, MessageCounts, SendInput,
};
use courier_core::config::GatewayConfig;
use courier_core::domain::{
    HistorySyncStatus, Instance, InstanceId, InstanceStatus, NetworkAddress, OutboundMessage,
    StoreError, TransportError,
};
use courier_core::impls::{InMemoryInstanceStore, InMemoryMessageStore};
use courier_core::ports::{
    ExistenceResult, InstanceStore, MediaCategory, SessionGateway, TransportSession, UploadResult,
};

const USER_SERVER: &str = "s.whatsapp.net";

/// ネットワークの代わり：送信はログに出すだけ、13 桁の番号だけが「登録済み」
struct ScriptedSession {
    sent: AtomicUsize,
}

#[async_trait]
impl TransportSession for ScriptedSession {
    fn is_logged_in(&self) -> bool {
        true
    }

    async fn send_presence_probe(&self) -> Result<(), TransportError> {
        info!("presence probe sent");
        Ok(())
    }

    async fn upload(
        &self,
        data: &[u8],
        category: MediaCategory,
    ) -> Result<UploadResult, TransportError> {
        info!(?category, bytes = data.len(), "media uploaded");
        Ok(UploadResult {
            url: "https://media.invalid/blob".into(),
            direct_path: "/blob".into(),
            media_key: vec![0; 32],
            file_enc_sha256: vec![0; 32],
            file_sha256: vec![0; 32],
            file_length: data.len() as u64,
        })
    }

    async fn send(
        &self,
        to: &NetworkAddress,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        info!(%to, summary = %message.summary(), n, "transmitted");
        Ok(())
    }

    async fn probe_existence(
        &self,
        candidates: &[String],
    ) -> Result<Vec<ExistenceResult>, TransportError> {
        Ok(candidates
            .iter()
            .map(|c| ExistenceResult {
                query: c.clone(),
                address: NetworkAddress::new(c.clone(), USER_SERVER),
                exists: c.len() == 13,
            })
            .collect())
    }
}

/// 起動から `converge_after` 経つまで ready にならない
struct ScriptedGateway {
    session: Arc<ScriptedSession>,
    known: HashSet<InstanceId>,
    started: Instant,
    converge_after: Duration,
}

#[async_trait]
impl SessionGateway for ScriptedGateway {
    async fn session(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Arc<dyn TransportSession>, TransportError> {
        if !self.known.contains(instance_id) {
            return Err(TransportError::Other(format!("no session for {instance_id}")));
        }
        Ok(self.session.clone())
    }

    fn is_session_ready(&self, _instance_id: &InstanceId) -> bool {
        self.started.elapsed() >= self.converge_after
    }
}

fn load_config() -> Result<GatewayConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            info!(%path, "config loaded");
            Ok(GatewayConfig::from_json_str(&raw)?)
        }
        None => {
            // デモ用に待ち時間を短くする
            let mut config = GatewayConfig::default();
            config.outbox.recovery_interval_ms = 3_000;
            config.history_sync.completion_delay_ms = 2_000;
            Ok(config)
        }
    }
}

async fn wait_for_completion(
    instances: &dyn InstanceStore,
    instance_id: &InstanceId,
) -> Result<(), StoreError> {
    loop {
        let instance = instances.get_by_id(instance_id).await?;
        if instance.history_sync_status == HistorySyncStatus::Completed {
            return Ok(());
        }
        sleep(Duration::from_millis(200)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let instance_id = InstanceId::new("demo");

    // (A) 協調者を用意（本番では DB / Redis / 実セッション）
    let instances = Arc::new(InMemoryInstanceStore::new());
    instances
        .put(Instance::new(instance_id.clone(), InstanceStatus::Active))
        .await;
    let messages = Arc::new(InMemoryMessageStore::new());
    let sessions = Arc::new(ScriptedGateway {
        session: Arc::new(ScriptedSession {
            sent: AtomicUsize::new(0),
        }),
        known: HashSet::from([instance_id.clone()]),
        started: Instant::now(),
        converge_after: Duration::from_millis(2_500),
    });

    let gateway = GatewayBuilder::new()
        .config(config)
        .session_gateway(sessions)
        .message_store(messages)
        .instance_store(instances.clone())
        .build()?;

    // (B) 同期送信：最初の 1 件は readiness を待つ（2 秒で presence probe）
    let text = SendInput::new(
        instance_id.clone(),
        "+55 (11) 9888-7777",
        MessageContent::text("hello from courier"),
    );
    match gateway.dispatch.send(text).await {
        Ok(message) => info!(message_id = %message.id, status = %message.status, "sync send"),
        Err(failure) => warn!(error = %failure, "sync send failed"),
    }

    let voice = SendInput::new(
        instance_id.clone(),
        "5511988887777",
        MessageContent::Audio {
            media: MediaInput::new(vec![0x4f, 0x67, 0x67, 0x53], "audio/ogg"),
            ptt: true,
            seconds: 1,
        },
    );
    if let Err(failure) = gateway.dispatch.send(voice).await {
        warn!(error = %failure, "voice note failed");
    }

    // (C) outbox：worker を起動してキュー経由で送る
    let scope = CancellationToken::new();
    let pool = gateway.outbox.start(&scope);
    for n in 1..=3 {
        let input = EnqueueInput::text(instance_id.clone(), "14155550100", format!("queued #{n}"));
        if let Err(e) = gateway.outbox.submit(input).await {
            warn!(error = %e, "submit failed");
        }
    }

    // (D) history sync cycle
    let cycle_id = gateway.history_sync.start_cycle(&instance_id).await?;
    let notification = serde_json::to_vec(&serde_json::json!({
        "directPath": "/v/t62/history",
        "fileLength": 1024,
        "syncType": 2,
        "chunkOrder": 1,
    }))?;
    gateway
        .history_sync
        .record_notification(&instance_id, notification)
        .await?;
    let processed = gateway.history_sync.process_pending(&instance_id).await?;
    info!(%cycle_id, processed, "history sync payloads processed");

    // (E) cycle の完了を待つ（Ctrl-C で中断）
    tokio::select! {
        res = wait_for_completion(instances.as_ref(), &instance_id) => res?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    // (F) 停止
    scope.cancel();
    pool.join().await;

    let listed = gateway.dispatch.list(&instance_id).await?;
    let counts = MessageCounts::from_messages(&listed);
    info!(
        sent = counts.sent,
        failed = counts.failed,
        in_flight = counts.in_flight(),
        "done"
    );
    Ok(())
}

//! テスト用の scripted なセッション / ゲートウェイ

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{InstanceId, NetworkAddress, OutboundMessage, TransportError};
use crate::ports::{
    ExistenceResult, MediaCategory, SessionGateway, TransportSession, UploadResult,
};

pub const USER_SERVER: &str = "s.whatsapp.net";

#[derive(Default)]
pub struct FakeSession {
    pub logged_out: AtomicBool,
    pub fail_send: Mutex<Option<TransportError>>,
    pub fail_upload: AtomicBool,
    pub fail_probe: AtomicBool,
    pub fail_presence: AtomicBool,
    /// Candidates the existence probe reports as registered.
    pub registered: Mutex<HashSet<String>>,
    pub sent: Mutex<Vec<(NetworkAddress, OutboundMessage)>>,
    pub uploads: Mutex<Vec<MediaCategory>>,
    pub probes: Mutex<Vec<Vec<String>>>,
    pub presence_probes: AtomicUsize,
}

impl FakeSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, user: &str) {
        self.registered.lock().unwrap().insert(user.to_string());
    }

    pub fn sent(&self) -> Vec<(NetworkAddress, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn probe_calls(&self) -> Vec<Vec<String>> {
        self.probes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportSession for FakeSession {
    fn is_logged_in(&self) -> bool {
        !self.logged_out.load(Ordering::SeqCst)
    }

    async fn send_presence_probe(&self) -> Result<(), TransportError> {
        self.presence_probes.fetch_add(1, Ordering::SeqCst);
        if self.fail_presence.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        Ok(())
    }

    async fn upload(
        &self,
        data: &[u8],
        category: MediaCategory,
    ) -> Result<UploadResult, TransportError> {
        self.uploads.lock().unwrap().push(category);
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("upload refused".into()));
        }
        Ok(UploadResult {
            url: "https://mmg.example/blob".into(),
            direct_path: "/v/t62/blob".into(),
            media_key: vec![1; 32],
            file_enc_sha256: vec![2; 32],
            file_sha256: vec![3; 32],
            file_length: data.len() as u64,
        })
    }

    async fn send(
        &self,
        to: &NetworkAddress,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        if let Some(err) = self.fail_send.lock().unwrap().clone() {
            return Err(err);
        }
        self.sent.lock().unwrap().push((to.clone(), message.clone()));
        Ok(())
    }

    async fn probe_existence(
        &self,
        candidates: &[String],
    ) -> Result<Vec<ExistenceResult>, TransportError> {
        self.probes.lock().unwrap().push(candidates.to_vec());
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        let registered = self.registered.lock().unwrap();
        Ok(candidates
            .iter()
            .map(|c| ExistenceResult {
                query: c.clone(),
                address: NetworkAddress::new(c.clone(), USER_SERVER),
                exists: registered.contains(c),
            })
            .collect())
    }
}

/// Gateway handing out one session. Readiness flips after `ready_after`
/// polls (`usize::MAX` = never).
pub struct FakeGateway {
    pub session: Arc<FakeSession>,
    pub missing: AtomicBool,
    pub ready_after: AtomicUsize,
    pub ready_polls: AtomicUsize,
}

impl FakeGateway {
    pub fn ready(session: Arc<FakeSession>) -> Arc<Self> {
        Self::ready_after(session, 0)
    }

    pub fn ready_after(session: Arc<FakeSession>, polls: usize) -> Arc<Self> {
        Arc::new(Self {
            session,
            missing: AtomicBool::new(false),
            ready_after: AtomicUsize::new(polls),
            ready_polls: AtomicUsize::new(0),
        })
    }

    pub fn never_ready(session: Arc<FakeSession>) -> Arc<Self> {
        Self::ready_after(session, usize::MAX)
    }
}

#[async_trait]
impl SessionGateway for FakeGateway {
    async fn session(
        &self,
        _instance_id: &InstanceId,
    ) -> Result<Arc<dyn TransportSession>, TransportError> {
        if self.missing.load(Ordering::SeqCst) {
            return Err(TransportError::Other("no client for instance".into()));
        }
        Ok(self.session.clone())
    }

    fn is_session_ready(&self, _instance_id: &InstanceId) -> bool {
        let polls = self.ready_polls.fetch_add(1, Ordering::SeqCst);
        polls >= self.ready_after.load(Ordering::SeqCst)
    }
}

//! Session ports - リモートのメッセージングネットワークへの接続
//!
//! ワイヤプロトコル・暗号ハンドシェイク・セッション永続化はこのクレートの責務外で、
//! ここではその能力（capability）だけを trait として定義します。
//!
//! - **SessionGateway**: instance ID から生きたセッションを引く（+ 暗号的に ready か）
//! - **TransportSession**: 1 インスタンス分のセッション

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{InstanceId, NetworkAddress, OutboundMessage, TransportError};

/// Media category used by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

/// What the network returns for an uploaded blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub file_enc_sha256: Vec<u8>,
    pub file_sha256: Vec<u8>,
    pub file_length: u64,
}

/// One answer of an existence probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceResult {
    /// The candidate as it was asked.
    pub query: String,
    /// Canonical address the network reports for it.
    pub address: NetworkAddress,
    pub exists: bool,
}

#[async_trait]
pub trait TransportSession: Send + Sync {
    fn is_logged_in(&self) -> bool;

    /// Liveness probe (presence "available"); nudges key material to converge.
    async fn send_presence_probe(&self) -> Result<(), TransportError>;

    async fn upload(
        &self,
        data: &[u8],
        category: MediaCategory,
    ) -> Result<UploadResult, TransportError>;

    async fn send(
        &self,
        to: &NetworkAddress,
        message: &OutboundMessage,
    ) -> Result<(), TransportError>;

    async fn probe_existence(
        &self,
        candidates: &[String],
    ) -> Result<Vec<ExistenceResult>, TransportError>;
}

#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn session(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Arc<dyn TransportSession>, TransportError>;

    /// Has the session's encryption material converged?
    fn is_session_ready(&self, instance_id: &InstanceId) -> bool;
}

//! GatewayConfig - ゲートウェイ全体の設定
//!
//! すべて `#[serde(default)]` なので、JSON には変えたい項目だけ書けば足ります。
//! 時間は config ファイル上ミリ秒で表現します。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Session readiness gate used by every send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub ready_timeout_ms: u64,
    pub ready_poll_interval_ms: u64,
    /// Non-readiness after which one presence probe is sent.
    pub presence_probe_after_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 10_000,
            ready_poll_interval_ms: 500,
            presence_probe_after_ms: 2_000,
        }
    }
}

impl DispatchConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn presence_probe_after(&self) -> Duration {
        Duration::from_millis(self.presence_probe_after_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub workers: usize,
    pub dequeue_timeout_ms: u64,
    pub recovery_interval_ms: u64,
    pub recovery_batch: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            dequeue_timeout_ms: 1_000,
            recovery_interval_ms: 30_000,
            recovery_batch: 50,
        }
    }
}

impl OutboxConfig {
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySyncConfig {
    /// Placeholder reconciliation window before a cycle completes.
    pub completion_delay_ms: u64,
}

impl Default for HistorySyncConfig {
    fn default() -> Self {
        Self {
            completion_delay_ms: 10_000,
        }
    }
}

impl HistorySyncConfig {
    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Destinations starting with this prefix get the mobile-digit probe.
    pub default_country_prefix: String,
    /// Canonical server suffix for user addresses.
    pub user_server: String,
    /// Digit that long-form mobile numbers carry after the area code.
    pub mobile_digit: char,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_country_prefix: "55".to_string(),
            user_server: "s.whatsapp.net".to_string(),
            mobile_digit: '9',
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub dispatch: DispatchConfig,
    pub outbox: OutboxConfig,
    pub history_sync: HistorySyncConfig,
    pub resolver: ResolverConfig,
}

impl GatewayConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 起動時検証（Fail-fast）
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.dispatch;
        if d.ready_timeout_ms == 0 || d.ready_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "dispatch timings must be non-zero".into(),
            ));
        }
        if d.ready_poll_interval_ms >= d.ready_timeout_ms {
            return Err(ConfigError::Invalid(
                "ready_poll_interval_ms must be shorter than ready_timeout_ms".into(),
            ));
        }

        let o = &self.outbox;
        if o.workers == 0 {
            return Err(ConfigError::Invalid("outbox.workers must be > 0".into()));
        }
        if o.recovery_batch == 0 {
            return Err(ConfigError::Invalid(
                "outbox.recovery_batch must be > 0".into(),
            ));
        }
        if o.dequeue_timeout_ms == 0 || o.recovery_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "outbox intervals must be non-zero".into(),
            ));
        }

        let r = &self.resolver;
        if r.default_country_prefix.is_empty()
            || !r.default_country_prefix.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ConfigError::Invalid(format!(
                "resolver.default_country_prefix must be digits, got {:?}",
                r.default_country_prefix
            )));
        }
        if r.user_server.is_empty() || !r.mobile_digit.is_ascii_digit() {
            return Err(ConfigError::Invalid(
                "resolver.user_server and resolver.mobile_digit are required".into(),
            ));
        }
        Ok(())
    }
}

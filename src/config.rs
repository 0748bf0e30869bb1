use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::transfer::{CoordinatorConfig, WorkerConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; the in-memory backend is used when unset
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub postgres_max_connections: u32,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,
    /// HS256 secret shared with the identity provider
    #[serde(default = "default_identity_secret")]
    pub identity_secret: String,
    pub session_ttl_minutes: i64,
    /// Shared secret for `/internal/mock/*` (mock-api builds only)
    pub internal_secret: String,
    /// How often expired sessions are purged
    pub purge_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-only-change-me".to_string(),
            identity_secret: default_identity_secret(),
            session_ttl_minutes: 30,
            internal_secret: "dev-secret".to_string(),
            purge_interval_secs: 60,
        }
    }
}

/// Transfer FSM and recovery worker settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    pub max_steps: usize,
    pub max_stalls: usize,
    pub retry_delay_ms: u64,
    pub scan_interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub batch_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_stalls: 3,
            retry_delay_ms: 100,
            scan_interval_secs: 30,
            stale_threshold_secs: 60,
            batch_size: 100,
        }
    }
}

impl TransferConfig {
    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_steps: self.max_steps,
            max_stalls: self.max_stalls,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            scan_interval: Duration::from_secs(self.scan_interval_secs),
            stale_threshold: Duration::from_secs(self.stale_threshold_secs),
            batch_size: self.batch_size,
        }
    }
}

fn default_identity_secret() -> String {
    "dev-identity-change-me".to_string()
}

fn default_max_connections() -> u32 {
    20
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::transfer::RetryPolicy;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; the in-memory store is used when unset
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Transfer retry and lock settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Attempts per transfer before a conflict is reported, including the first
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Longest wait for an account row lock before the attempt conflicts
    pub lock_timeout_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 20,
            lock_timeout_ms: 5_000,
        }
    }
}

impl TransferConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn default_db_max_connections() -> u32 {
    10
}

impl AppConfig {
    /// Load `config/{env}.yaml`. `DATABASE_URL` overrides `postgres_url`.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;

        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.is_empty()
        {
            config.postgres_url = Some(url);
        }
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        if config.transfer.max_attempts == 0 {
            anyhow::bail!("transfer.max_attempts must be at least 1");
        }
        Ok(config)
    }
}

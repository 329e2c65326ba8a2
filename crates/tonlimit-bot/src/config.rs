//! Application configuration.
//!
//! Loaded from TOML. Secrets (database url, TON API key, custody cipher key)
//! are never written in the file itself, only where to read them from.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tonlimit_api::ApiConfig;
use tonlimit_engine::{EngineConfig, OperatingMode};
use tonlimit_wallet::{KeySource, DEFAULT_TONAPI_URL};

use crate::error::{AppError, AppResult};

/// Order store backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string source. Absent: in-memory store.
    #[serde(default)]
    pub url: Option<KeySource>,
    /// Pool size. Default: 5.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Pool acquire timeout (ms). Default: 5,000.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Apply the schema at startup. Default: true.
    #[serde(default = "default_migrate")]
    pub migrate: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_migrate() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            migrate: default_migrate(),
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// TON API client (rates and transaction status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonApiConfig {
    #[serde(default = "default_tonapi_url")]
    pub base_url: String,
    /// Optional bearer token source.
    #[serde(default)]
    pub api_key: Option<KeySource>,
    /// HTTP timeout (ms). Default: 10,000.
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_tonapi_url() -> String {
    DEFAULT_TONAPI_URL.to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

impl Default for TonApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_tonapi_url(),
            api_key: None,
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

/// Private wallet service that builds and signs swaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletServiceConfig {
    #[serde(default = "default_wallet_service_url")]
    pub url: String,
    /// HTTP timeout (ms). Default: 10,000.
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_wallet_service_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

impl Default for WalletServiceConfig {
    fn default() -> Self {
        Self {
            url: default_wallet_service_url(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

/// Custody cipher key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyConfig {
    #[serde(default = "default_encryption_key")]
    pub encryption_key: KeySource,
}

fn default_encryption_key() -> KeySource {
    KeySource::EnvVar {
        var_name: "TONLIMIT_ENCRYPTION_KEY".to_string(),
    }
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            encryption_key: default_encryption_key(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tonapi: TonApiConfig,
    #[serde(default)]
    pub wallet_service: WalletServiceConfig,
    #[serde(default)]
    pub custody: CustodyConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.engine.validate()?;
        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.tonapi.timeout_ms == 0 || self.wallet_service.timeout_ms == 0 {
            return Err(AppError::Config("HTTP timeouts must be positive".to_string()));
        }
        Ok(())
    }

    /// Check if in observation mode.
    pub fn is_observation_mode(&self) -> bool {
        self.engine.mode == OperatingMode::Observation
    }
}

/// Config path: CLI arg > `TONLIMIT_CONFIG` env var > `config/default.toml`.
pub fn resolve_config_path(cli: Option<String>) -> String {
    cli.or_else(|| std::env::var("TONLIMIT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string())
}

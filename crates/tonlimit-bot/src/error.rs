//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Secret error: {0}")]
    Key(#[from] tonlimit_wallet::KeyError),

    #[error("Adapter setup error: {0}")]
    Wallet(#[from] tonlimit_wallet::WalletError),

    #[error("Store error: {0}")]
    Store(#[from] tonlimit_store::StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] tonlimit_engine::EngineError),

    #[error("API server error: {0}")]
    Api(#[from] tonlimit_api::ApiError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tonlimit_telemetry::TelemetryError),

    #[error("Task failed: {0}")]
    Task(String),
}

pub type AppResult<T> = Result<T, AppError>;

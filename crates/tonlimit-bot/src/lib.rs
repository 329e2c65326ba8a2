//! tonlimit conditional swap service.
//!
//! Main application that wires all components:
//! - Order store (Postgres, or in-memory for observation runs)
//! - TON API oracle and settlement adapter
//! - Wallet service swap adapter and Fernet custody
//! - Evaluate and monitor scheduler
//! - Order API server with wallet onboarding

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, WalletOnboarding};
pub use config::{resolve_config_path, AppConfig};
pub use error::{AppError, AppResult};

//! Error types for tonlimit-core.

use thiserror::Error;

use crate::order::OrderStatus;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Invalid asset reference: {0}")]
    InvalidAsset(String),

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Unknown order side: {0}")]
    UnknownSide(String),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

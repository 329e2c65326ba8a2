//! Store error types.

use thiserror::Error;
use tonlimit_core::{CoreError, OrderId, OrderStatus, UserRef};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Order {id} is {status} and can no longer be edited")]
    NotEditable { id: OrderId, status: OrderStatus },

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("User {0} already has a wallet")]
    DuplicateWallet(UserRef),

    #[error("Invalid order: {0}")]
    Invalid(#[from] CoreError),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

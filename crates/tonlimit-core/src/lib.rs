//! Core domain types for the tonlimit conditional swap engine.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`, `Volume`: Precision-safe numeric types
//! - `Order`, `OrderStatus`, `OrderSide`: The order record and its state machine
//! - `WalletRecord`, `EncryptedSecret`: Custodial wallet records (secrets stay encrypted)
//! - `Quote`, `should_trigger`: Price quotes and the trigger rule

pub mod decimal;
pub mod error;
pub mod order;
pub mod trigger;
pub mod wallet;

pub use decimal::{Price, Volume};
pub use error::{CoreError, Result};
pub use order::{
    AssetRef, NewOrder, Order, OrderId, OrderPatch, OrderSide, OrderStatus, StatusUpdate, TxRef,
    TxStatus,
};
pub use trigger::{should_trigger, Quote};
pub use wallet::{EncryptedSecret, UserRef, WalletId, WalletRecord};

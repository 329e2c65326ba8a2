//! Adapter contracts consumed by the engine.
//!
//! All traits are dyn-compatible (boxed futures) so concrete clients and
//! mocks can be injected at startup behind `Arc<dyn ...>`.

use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tonlimit_core::{AssetRef, OrderId, OrderSide, Quote, TxRef, TxStatus, Volume, WalletRecord};

use crate::custody::{GeneratedWallet, Signer};
use crate::error::{AdapterError, CustodyError, SubmissionError};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Swap submission parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapRequest {
    /// Order id; lets the wallet service collapse duplicate submissions.
    pub idempotency_key: OrderId,
    pub side: OrderSide,
    pub asset: AssetRef,
    pub amount: Volume,
}

/// Fresh exchange rates.
pub trait PriceOracle: Send + Sync {
    fn quote(
        &self,
        side: OrderSide,
        asset: &AssetRef,
        amount: Volume,
    ) -> BoxFuture<'_, Result<Quote, AdapterError>>;
}

/// Restores a signer from a wallet's encrypted secret.
pub trait CustodyAdapter: Send + Sync {
    fn restore_signer(&self, wallet: &WalletRecord) -> BoxFuture<'_, Result<Signer, CustodyError>>;
}

/// Submits swaps on the target chain.
///
/// The signer is moved into the returned future and dropped with it.
pub trait SwapAdapter: Send + Sync {
    fn submit_swap(
        &self,
        signer: Signer,
        request: SwapRequest,
    ) -> BoxFuture<'_, Result<TxRef, SubmissionError>>;
}

/// Reports chain status of submitted transactions.
pub trait SettlementAdapter: Send + Sync {
    fn poll_status(&self, tx_ref: &TxRef) -> BoxFuture<'_, Result<TxStatus, AdapterError>>;
}

/// Generates new wallets. Keys are never generated in this process.
pub trait WalletProvisioner: Send + Sync {
    fn create_wallet(&self) -> BoxFuture<'_, Result<GeneratedWallet, AdapterError>>;
}

pub type DynPriceOracle = Arc<dyn PriceOracle>;
pub type DynCustodyAdapter = Arc<dyn CustodyAdapter>;
pub type DynSwapAdapter = Arc<dyn SwapAdapter>;
pub type DynSettlementAdapter = Arc<dyn SettlementAdapter>;
pub type DynWalletProvisioner = Arc<dyn WalletProvisioner>;

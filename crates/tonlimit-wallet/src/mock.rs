//! Scriptable in-process adapters for tests and dry runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use zeroize::Zeroizing;

use tonlimit_core::{AssetRef, OrderSide, Quote, TxRef, TxStatus, Volume, WalletRecord};

use crate::adapter::{
    BoxFuture, CustodyAdapter, PriceOracle, SettlementAdapter, SwapAdapter, SwapRequest,
    WalletProvisioner,
};
use crate::custody::{GeneratedWallet, Signer};
use crate::error::{AdapterError, CustodyError, SubmissionError};

/// Mock price oracle.
///
/// Scripted rates are consumed first, one per call; afterwards the fixed
/// rate for the asset is returned.
#[derive(Debug, Default)]
pub struct MockPriceOracle {
    scripted: Mutex<HashMap<AssetRef, VecDeque<Result<Decimal, AdapterError>>>>,
    fixed: Mutex<HashMap<AssetRef, Decimal>>,
    calls: Mutex<Vec<(OrderSide, AssetRef, Volume)>>,
    delay: Mutex<Option<Duration>>,
}

impl MockPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rate returned whenever no scripted answer is queued.
    pub fn set_rate(&self, asset: &AssetRef, rate: Decimal) {
        self.fixed.lock().insert(asset.clone(), rate);
    }

    /// Queue answers for the next calls on `asset`.
    pub fn push_results(
        &self,
        asset: &AssetRef,
        results: impl IntoIterator<Item = Result<Decimal, AdapterError>>,
    ) {
        self.scripted
            .lock()
            .entry(asset.clone())
            .or_default()
            .extend(results);
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn get_calls(&self) -> Vec<(OrderSide, AssetRef, Volume)> {
        self.calls.lock().clone()
    }

    fn next_rate(&self, asset: &AssetRef) -> Result<Decimal, AdapterError> {
        if let Some(result) = self
            .scripted
            .lock()
            .get_mut(asset)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }
        self.fixed
            .lock()
            .get(asset)
            .copied()
            .ok_or_else(|| AdapterError::Unavailable(format!("no rate for {asset}")))
    }
}

impl PriceOracle for MockPriceOracle {
    fn quote(
        &self,
        side: OrderSide,
        asset: &AssetRef,
        amount: Volume,
    ) -> BoxFuture<'_, Result<Quote, AdapterError>> {
        let asset = asset.clone();
        Box::pin(async move {
            self.calls.lock().push((side, asset.clone(), amount));
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let rate = self.next_rate(&asset)?;
            Ok(Quote {
                side,
                asset,
                amount,
                rate,
                quoted_at: Utc::now(),
            })
        })
    }
}

/// Mock custody adapter. Succeeds unless a failure is set.
#[derive(Debug, Default)]
pub struct MockCustody {
    failure: Mutex<Option<CustodyError>>,
    restores: AtomicUsize,
}

impl MockCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every restoration with `error` until cleared.
    pub fn set_failure(&self, error: Option<CustodyError>) {
        *self.failure.lock() = error;
    }

    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl CustodyAdapter for MockCustody {
    fn restore_signer(&self, wallet: &WalletRecord) -> BoxFuture<'_, Result<Signer, CustodyError>> {
        let address = wallet.address.clone();
        Box::pin(async move {
            self.restores.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.failure.lock().clone() {
                return Err(error);
            }
            let words = Zeroizing::new(vec!["abandon".to_string(); 12]);
            Ok(Signer::new(address, words))
        })
    }
}

/// Mock swap adapter.
///
/// Returns queued results first, then `tx-<n>` references.
#[derive(Debug, Default)]
pub struct MockSwapAdapter {
    submissions: Mutex<Vec<SwapRequest>>,
    queued: Mutex<VecDeque<Result<TxRef, SubmissionError>>>,
    delay: Mutex<Option<Duration>>,
}

impl MockSwapAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: Result<TxRef, SubmissionError>) {
        self.queued.lock().push_back(result);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Recorded submissions for verification.
    pub fn get_submissions(&self) -> Vec<SwapRequest> {
        self.submissions.lock().clone()
    }
}

impl SwapAdapter for MockSwapAdapter {
    fn submit_swap(
        &self,
        signer: Signer,
        request: SwapRequest,
    ) -> BoxFuture<'_, Result<TxRef, SubmissionError>> {
        Box::pin(async move {
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            drop(signer);
            let n = {
                let mut submissions = self.submissions.lock();
                submissions.push(request);
                submissions.len()
            };
            let queued = self.queued.lock().pop_front();
            queued.unwrap_or_else(|| Ok(TxRef::new(format!("tx-{n}"))))
        })
    }
}

/// Mock settlement adapter. Unknown transactions report pending.
#[derive(Debug, Default)]
pub struct MockSettlement {
    statuses: Mutex<HashMap<TxRef, Result<TxStatus, AdapterError>>>,
    polls: Mutex<Vec<TxRef>>,
}

impl MockSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, tx_ref: TxRef, status: Result<TxStatus, AdapterError>) {
        self.statuses.lock().insert(tx_ref, status);
    }

    pub fn get_polls(&self) -> Vec<TxRef> {
        self.polls.lock().clone()
    }
}

impl SettlementAdapter for MockSettlement {
    fn poll_status(&self, tx_ref: &TxRef) -> BoxFuture<'_, Result<TxStatus, AdapterError>> {
        let tx_ref = tx_ref.clone();
        Box::pin(async move {
            self.polls.lock().push(tx_ref.clone());
            self.statuses
                .lock()
                .get(&tx_ref)
                .cloned()
                .unwrap_or(Ok(TxStatus::Pending))
        })
    }
}

/// Mock wallet provisioner.
///
/// Hands out `EQgenerated-<n>` wallets with a fixed 12 word mnemonic.
#[derive(Debug, Default)]
pub struct MockWalletProvisioner {
    created: AtomicUsize,
    failure: Mutex<Option<AdapterError>>,
}

impl MockWalletProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failure(&self, error: Option<AdapterError>) {
        *self.failure.lock() = error;
    }

    /// Wallets generated so far.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl WalletProvisioner for MockWalletProvisioner {
    fn create_wallet(&self) -> BoxFuture<'_, Result<GeneratedWallet, AdapterError>> {
        Box::pin(async move {
            if let Some(error) = self.failure.lock().clone() {
                return Err(error);
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(GeneratedWallet::new(
                format!("EQgenerated-{n}"),
                Zeroizing::new(format!("secret-{n}")),
                Zeroizing::new(vec!["abandon".to_string(); 12]),
            ))
        })
    }
}

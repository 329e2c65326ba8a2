//! Execution dispatcher: restore signer, submit swap, claim the order.
//!
//! The claim (CREATED -> PENDING) happens only after the wallet service has
//! accepted the swap. The order id travels as the idempotency key, so a
//! submission whose claim is lost can be collapsed by the wallet service.

use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use tonlimit_core::{should_trigger, Order, OrderStatus, StatusUpdate, TxRef};
use tonlimit_store::DynOrderStore;
use tonlimit_telemetry::Metrics;
use tonlimit_wallet::{DynCustodyAdapter, DynSwapAdapter, SwapRequest};

use crate::call::bounded;
use crate::error::EngineError;

/// Result of one dispatch attempt.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Swap submitted and order moved to PENDING.
    Claimed(TxRef),
    /// Swap submitted but another writer moved the order first.
    LostClaim(TxRef),
    /// Order no longer CREATED, or no longer triggered, at re-read.
    Skipped,
    /// Permanent failure, order moved to ERROR.
    Escalated(String),
    /// Transient failure, order stays CREATED for the next tick.
    Deferred(EngineError),
}

impl DispatchOutcome {
    /// Short label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Claimed(_) => "claimed",
            Self::LostClaim(_) => "lost_claim",
            Self::Skipped => "skipped",
            Self::Escalated(_) => "escalated",
            Self::Deferred(e) => e.label(),
        }
    }
}

/// Dispatches triggered orders.
pub struct Dispatcher {
    store: DynOrderStore,
    custody: DynCustodyAdapter,
    swap: DynSwapAdapter,
    call_timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        store: DynOrderStore,
        custody: DynCustodyAdapter,
        swap: DynSwapAdapter,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            custody,
            swap,
            call_timeout,
        }
    }

    /// Dispatch one order that triggered at `rate`.
    ///
    /// At most one signer restoration and one submission per call.
    pub async fn dispatch(&self, order: &Order, rate: Decimal) -> DispatchOutcome {
        let outcome = self.try_dispatch(order, rate).await;
        Metrics::dispatch(outcome.label());
        outcome
    }

    async fn try_dispatch(&self, order: &Order, rate: Decimal) -> DispatchOutcome {
        let id = order.id;

        // 1. Owning wallet
        let lookup = self.store.get_wallet(order.wallet_id);
        let wallet = match bounded(self.call_timeout, "get_wallet", lookup).await {
            Ok(Some(wallet)) => wallet,
            Ok(None) => {
                let reason = format!("wallet {} not found", order.wallet_id);
                return self.escalate(order, reason).await;
            }
            Err(e) => {
                warn!(order_id = %id, error = %e, "Failed to load wallet");
                return DispatchOutcome::Deferred(e);
            }
        };

        // 2. Re-read: the order may have been claimed, deleted or edited
        let reread = self.store.get_order(id);
        let current = match bounded(self.call_timeout, "get_order", reread).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                debug!(order_id = %id, "Order deleted before dispatch");
                return DispatchOutcome::Skipped;
            }
            Err(e) => {
                warn!(order_id = %id, error = %e, "Failed to re-read order");
                return DispatchOutcome::Deferred(e);
            }
        };
        if current.status != OrderStatus::Created
            || current.asset != order.asset
            || !should_trigger(current.side, rate, current.price)
        {
            debug!(order_id = %id, status = %current.status, "Order changed before dispatch");
            return DispatchOutcome::Skipped;
        }

        // 3. Signer
        let restore = self.custody.restore_signer(&wallet);
        let signer = match bounded(self.call_timeout, "restore_signer", restore).await {
            Ok(signer) => signer,
            Err(e) if e.is_permanent() => {
                return self.escalate(&current, e.to_string()).await;
            }
            Err(e) => {
                warn!(order_id = %id, error = %e, "Signer restoration failed");
                self.record_error(&current, &e).await;
                return DispatchOutcome::Deferred(e);
            }
        };

        // 4. Submit; the signer is dropped with the submission future
        let request = SwapRequest {
            idempotency_key: id,
            side: current.side,
            asset: current.asset.clone(),
            amount: current.volume,
        };
        let submission = self.swap.submit_swap(signer, request);
        let tx_ref = match bounded(self.call_timeout, "submit_swap", submission).await {
            Ok(tx_ref) => tx_ref,
            Err(e) => {
                warn!(order_id = %id, error = %e, "Swap submission failed");
                self.record_error(&current, &e).await;
                return DispatchOutcome::Deferred(e);
            }
        };

        // 5. Claim
        let claim = self.store.conditional_update(
            id,
            OrderStatus::Created,
            StatusUpdate::claim(tx_ref.clone()),
        );
        match bounded(self.call_timeout, "claim", claim).await {
            Ok(true) => {
                info!(
                    order_id = %id,
                    side = %current.side,
                    asset = %current.asset,
                    volume = %current.volume,
                    %rate,
                    %tx_ref,
                    "Order claimed"
                );
                DispatchOutcome::Claimed(tx_ref)
            }
            Ok(false) => {
                warn!(
                    order_id = %id,
                    %tx_ref,
                    "Claim lost after submission, possible duplicate swap"
                );
                Metrics::lost_claim();
                DispatchOutcome::LostClaim(tx_ref)
            }
            Err(e) => {
                error!(
                    order_id = %id,
                    %tx_ref,
                    error = %e,
                    "Swap submitted but claim failed; resubmission relies on idempotency key"
                );
                DispatchOutcome::Deferred(e)
            }
        }
    }

    /// CREATED -> ERROR with the reason recorded.
    async fn escalate(&self, order: &Order, reason: String) -> DispatchOutcome {
        let update = StatusUpdate::escalate(reason.clone());
        let escalation = self.store.conditional_update(order.id, OrderStatus::Created, update);
        match bounded(self.call_timeout, "escalate", escalation).await {
            Ok(true) => {
                error!(order_id = %order.id, %reason, "Order moved to ERROR");
                DispatchOutcome::Escalated(reason)
            }
            Ok(false) => DispatchOutcome::Skipped,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to escalate order");
                DispatchOutcome::Deferred(e)
            }
        }
    }

    async fn record_error(&self, order: &Order, err: &EngineError) {
        let record = self
            .store
            .record_error(order.id, OrderStatus::Created, err.to_string());
        if let Err(e) = bounded(self.call_timeout, "record_error", record).await {
            warn!(order_id = %order.id, error = %e, "Failed to record order error");
        }
    }
}

//! Settlement monitor: reconcile PENDING orders with chain outcomes.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use tonlimit_core::{Order, OrderStatus, StatusUpdate, TxStatus};
use tonlimit_store::DynOrderStore;
use tonlimit_telemetry::Metrics;
use tonlimit_wallet::DynSettlementAdapter;

use crate::call::bounded;
use crate::error::{EngineError, EngineResult};
use crate::scan::ScanCursor;

/// What happened to one PENDING order during a tick.
#[derive(Debug)]
pub enum Settlement {
    /// Moved to EXECUTED or FAILED.
    Settled(OrderStatus),
    /// Still PENDING; will be polled again.
    Unresolved(u32),
    /// Staleness threshold reached, moved to ERROR.
    Escalated(u32),
    /// Order changed under us or carries no tx_ref.
    Skipped,
    /// Store write failed; retried next tick.
    StoreFailed(EngineError),
}

impl Settlement {
    fn label(&self) -> &'static str {
        match self {
            Self::Settled(OrderStatus::Executed) => "executed",
            Self::Settled(_) => "failed",
            Self::Unresolved(_) => "unresolved",
            Self::Escalated(_) => "stale",
            Self::Skipped => "skipped",
            Self::StoreFailed(_) => "store_error",
        }
    }
}

/// Per-tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub polled: usize,
    pub executed: usize,
    pub failed: usize,
    pub unresolved: usize,
    pub escalated: usize,
    pub skipped: usize,
    pub store_failures: usize,
    /// Not polled this tick because the budget ran out.
    pub carried_over: usize,
}

impl MonitorSummary {
    fn record(&mut self, settlement: &Settlement) {
        self.polled += 1;
        match settlement {
            Settlement::Settled(OrderStatus::Executed) => self.executed += 1,
            Settlement::Settled(_) => self.failed += 1,
            Settlement::Unresolved(_) => self.unresolved += 1,
            Settlement::Escalated(_) => self.escalated += 1,
            Settlement::Skipped => self.skipped += 1,
            Settlement::StoreFailed(_) => self.store_failures += 1,
        }
    }
}

/// Polls settlement for PENDING orders.
pub struct Monitor {
    store: DynOrderStore,
    settlement: DynSettlementAdapter,
    call_timeout: Duration,
    tick_budget: Duration,
    max_concurrency: usize,
    max_unresolved_polls: Option<u32>,
    cursor: ScanCursor,
}

impl Monitor {
    #[must_use]
    pub fn new(
        store: DynOrderStore,
        settlement: DynSettlementAdapter,
        call_timeout: Duration,
        tick_budget: Duration,
        max_concurrency: usize,
        max_unresolved_polls: Option<u32>,
    ) -> Self {
        Self {
            store,
            settlement,
            call_timeout,
            tick_budget,
            max_concurrency: max_concurrency.max(1),
            max_unresolved_polls,
            cursor: ScanCursor::default(),
        }
    }

    /// One monitoring pass over all PENDING orders.
    pub async fn run_tick(&self) -> EngineResult<MonitorSummary> {
        let list = self.store.list_by_status(OrderStatus::Pending);
        let orders = bounded(self.call_timeout, "list_pending", list).await?;

        let scan = self
            .cursor
            .run(orders, self.tick_budget, self.max_concurrency, |order| {
                self.reconcile(order)
            })
            .await;

        let mut summary = MonitorSummary {
            carried_over: scan.carried_over,
            ..Default::default()
        };
        for settlement in &scan.results {
            Metrics::settlement(settlement.label());
            summary.record(settlement);
        }
        if summary.carried_over > 0 {
            warn!(
                polled = summary.polled,
                carried_over = summary.carried_over,
                "Tick budget exhausted, remaining orders lead the next tick"
            );
            Metrics::tick_overrun("monitor");
        }
        Ok(summary)
    }

    /// Refresh the per-status order gauges.
    pub async fn refresh_gauges(&self) -> EngineResult<()> {
        let query = self.store.count_by_status();
        let counts = bounded(self.call_timeout, "count_by_status", query).await?;
        for (status, count) in counts {
            Metrics::orders_in_status(status.as_str(), i64::try_from(count).unwrap_or(i64::MAX));
        }
        Ok(())
    }

    async fn reconcile(&self, order: Order) -> Settlement {
        let Some(tx_ref) = order.tx_ref.clone() else {
            warn!(order_id = %order.id, "PENDING order without tx_ref");
            return Settlement::Skipped;
        };

        let poll = self.settlement.poll_status(&tx_ref);
        let reason = match bounded(self.call_timeout, "poll_status", poll).await {
            Ok(status @ (TxStatus::Confirmed | TxStatus::Aborted)) => {
                return self.settle(&order, status).await;
            }
            Ok(TxStatus::Pending) => {
                EngineError::SettlementAmbiguous(format!("{tx_ref} still pending"))
            }
            Err(e) => {
                warn!(order_id = %order.id, %tx_ref, error = %e, "Settlement poll failed");
                e
            }
        };
        self.unresolved(&order, reason).await
    }

    async fn settle(&self, order: &Order, status: TxStatus) -> Settlement {
        let Some(target) = status.settled_status() else {
            return Settlement::Skipped;
        };
        let write = self.store.conditional_update(
            order.id,
            OrderStatus::Pending,
            StatusUpdate::settle(target),
        );
        match bounded(self.call_timeout, "settle", write).await {
            Ok(true) => {
                info!(order_id = %order.id, tx_ref = ?order.tx_ref, status = %target, "Order settled");
                Settlement::Settled(target)
            }
            Ok(false) => Settlement::Skipped,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to settle order");
                Settlement::StoreFailed(e)
            }
        }
    }

    async fn unresolved(&self, order: &Order, reason: EngineError) -> Settlement {
        let count_write = self.store.record_unresolved_poll(order.id);
        let polls = match bounded(self.call_timeout, "record_unresolved_poll", count_write).await {
            Ok(Some(polls)) => polls,
            Ok(None) => return Settlement::Skipped,
            Err(e) => return Settlement::StoreFailed(e),
        };
        debug!(order_id = %order.id, polls, %reason, "Settlement unresolved");

        match self.max_unresolved_polls {
            Some(limit) if polls >= limit => self.escalate(order, polls, &reason).await,
            _ => Settlement::Unresolved(polls),
        }
    }

    async fn escalate(&self, order: &Order, polls: u32, last: &EngineError) -> Settlement {
        let reason =
            format!("settlement unresolved after {polls} polls ({last}), needs manual reconciliation");
        let write = self.store.conditional_update(
            order.id,
            OrderStatus::Pending,
            StatusUpdate::escalate(reason),
        );
        match bounded(self.call_timeout, "escalate", write).await {
            Ok(true) => {
                error!(order_id = %order.id, tx_ref = ?order.tx_ref, polls, "Stale settlement moved to ERROR");
                Settlement::Escalated(polls)
            }
            Ok(false) => Settlement::Skipped,
            Err(e) => Settlement::StoreFailed(e),
        }
    }
}

//! Trigger evaluator: quote every CREATED order and hand triggered ones on.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use tonlimit_core::{should_trigger, Order, OrderStatus};
use tonlimit_store::DynOrderStore;
use tonlimit_telemetry::Metrics;
use tonlimit_wallet::DynPriceOracle;

use crate::call::bounded;
use crate::config::OperatingMode;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::EngineResult;
use crate::scan::ScanCursor;

/// What happened to one order during a tick.
#[derive(Debug)]
pub enum Evaluation {
    QuoteFailed,
    NotTriggered,
    /// Triggered in observation mode; nothing dispatched.
    Observed,
    Dispatched(DispatchOutcome),
}

/// Per-tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub quote_failures: usize,
    pub triggered: usize,
    pub observed: usize,
    pub claimed: usize,
    pub lost_claims: usize,
    pub skipped: usize,
    pub escalated: usize,
    pub deferred: usize,
    /// Not quoted this tick because the budget ran out.
    pub carried_over: usize,
}

impl EvaluationSummary {
    fn record(&mut self, evaluation: &Evaluation) {
        self.evaluated += 1;
        match evaluation {
            Evaluation::QuoteFailed => self.quote_failures += 1,
            Evaluation::NotTriggered => {}
            Evaluation::Observed => {
                self.triggered += 1;
                self.observed += 1;
            }
            Evaluation::Dispatched(outcome) => {
                self.triggered += 1;
                match outcome {
                    DispatchOutcome::Claimed(_) => self.claimed += 1,
                    DispatchOutcome::LostClaim(_) => self.lost_claims += 1,
                    DispatchOutcome::Skipped => self.skipped += 1,
                    DispatchOutcome::Escalated(_) => self.escalated += 1,
                    DispatchOutcome::Deferred(_) => self.deferred += 1,
                }
            }
        }
    }
}

/// Evaluates CREATED orders against fresh quotes.
pub struct Evaluator {
    store: DynOrderStore,
    oracle: DynPriceOracle,
    dispatcher: Arc<Dispatcher>,
    mode: OperatingMode,
    call_timeout: Duration,
    tick_budget: Duration,
    max_concurrency: usize,
    cursor: ScanCursor,
}

impl Evaluator {
    #[must_use]
    pub fn new(
        store: DynOrderStore,
        oracle: DynPriceOracle,
        dispatcher: Arc<Dispatcher>,
        mode: OperatingMode,
        call_timeout: Duration,
        tick_budget: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            oracle,
            dispatcher,
            mode,
            call_timeout,
            tick_budget,
            max_concurrency: max_concurrency.max(1),
            cursor: ScanCursor::default(),
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// One evaluate-and-execute pass over all CREATED orders.
    ///
    /// Fails only if the order scan itself fails; per-order failures are
    /// counted in the summary. Orders not started within the tick budget
    /// lead the next tick's scan.
    pub async fn run_tick(&self) -> EngineResult<EvaluationSummary> {
        let list = self.store.list_by_status(OrderStatus::Created);
        let orders = bounded(self.call_timeout, "list_created", list).await?;

        let scan = self
            .cursor
            .run(orders, self.tick_budget, self.max_concurrency, |order| {
                self.evaluate(order)
            })
            .await;

        let mut summary = EvaluationSummary {
            carried_over: scan.carried_over,
            ..Default::default()
        };
        for evaluation in &scan.results {
            summary.record(evaluation);
        }
        if summary.carried_over > 0 {
            warn!(
                evaluated = summary.evaluated,
                carried_over = summary.carried_over,
                "Tick budget exhausted, remaining orders lead the next tick"
            );
            Metrics::tick_overrun("evaluate");
        }
        if summary.triggered > 0 {
            debug!(?summary, "Evaluation tick complete");
        }
        Ok(summary)
    }

    async fn evaluate(&self, order: Order) -> Evaluation {
        Metrics::order_evaluated();

        let request = self.oracle.quote(order.side, &order.asset, order.volume);
        let quote = match bounded(self.call_timeout, "quote", request).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(order_id = %order.id, asset = %order.asset, error = %e, "Quote failed");
                Metrics::quote_failed(e.label());
                return Evaluation::QuoteFailed;
            }
        };
        if !quote.is_valid() {
            warn!(order_id = %order.id, asset = %order.asset, rate = %quote.rate, "Invalid quote");
            Metrics::quote_failed("invalid_rate");
            return Evaluation::QuoteFailed;
        }

        if !should_trigger(order.side, quote.rate, order.price) {
            return Evaluation::NotTriggered;
        }
        Metrics::triggered(order.side.as_str());

        match self.mode {
            OperatingMode::Observation => {
                info!(
                    order_id = %order.id,
                    side = %order.side,
                    price = %order.price,
                    rate = %quote.rate,
                    "Trigger met (observation mode, not dispatched)"
                );
                Evaluation::Observed
            }
            OperatingMode::Trading => {
                Evaluation::Dispatched(self.dispatcher.dispatch(&order, quote.rate).await)
            }
        }
    }
}

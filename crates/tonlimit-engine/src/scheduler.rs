//! Scheduler driver: two independent periodic loops.
//!
//! The evaluate loop and the monitor loop each await their own tick, so
//! ticks of one loop never overlap. Missed ticks are skipped and
//! cancellation is only observed between ticks. A tick is never cut short:
//! it stops launching orders once `tick_timeout` has passed and then waits
//! for the ones in flight, each bounded by `call_timeout`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tonlimit_store::DynOrderStore;
use tonlimit_telemetry::Metrics;
use tonlimit_wallet::{DynCustodyAdapter, DynPriceOracle, DynSettlementAdapter, DynSwapAdapter};

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::EngineResult;
use crate::evaluator::Evaluator;
use crate::monitor::Monitor;

const EVALUATE_LOOP: &str = "evaluate";
const MONITOR_LOOP: &str = "monitor";

/// External collaborators injected at startup.
#[derive(Clone)]
pub struct EngineAdapters {
    pub oracle: DynPriceOracle,
    pub custody: DynCustodyAdapter,
    pub swap: DynSwapAdapter,
    pub settlement: DynSettlementAdapter,
}

/// Ticks completed by each loop before shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub evaluate_ticks: u64,
    pub monitor_ticks: u64,
}

/// Drives the evaluator and the settlement monitor.
pub struct Scheduler {
    evaluator: Arc<Evaluator>,
    monitor: Arc<Monitor>,
    config: EngineConfig,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: EngineConfig, evaluator: Arc<Evaluator>, monitor: Arc<Monitor>) -> Self {
        Self {
            evaluator,
            monitor,
            config,
        }
    }

    /// Wire evaluator, dispatcher and monitor from a validated config.
    pub fn build(
        config: EngineConfig,
        store: DynOrderStore,
        adapters: EngineAdapters,
    ) -> EngineResult<Self> {
        config.validate()?;
        let call_timeout = config.call_timeout();
        let tick_budget = config.tick_timeout();

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            adapters.custody,
            adapters.swap,
            call_timeout,
        ));
        let evaluator = Arc::new(Evaluator::new(
            Arc::clone(&store),
            adapters.oracle,
            dispatcher,
            config.mode,
            call_timeout,
            tick_budget,
            config.max_concurrency,
        ));
        let monitor = Arc::new(Monitor::new(
            store,
            adapters.settlement,
            call_timeout,
            tick_budget,
            config.max_concurrency,
            config.max_unresolved_polls,
        ));
        Ok(Self::new(config, evaluator, monitor))
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Run both loops until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> SchedulerReport {
        info!(
            mode = ?self.config.mode,
            evaluate_interval_ms = self.config.evaluate_interval_ms,
            monitor_interval_ms = self.config.monitor_interval_ms,
            "Scheduler starting"
        );
        let tick_budget = self.config.tick_timeout();

        let evaluate = run_loop(
            EVALUATE_LOOP,
            self.config.evaluate_interval(),
            tick_budget,
            shutdown.clone(),
            || {
                let evaluator = Arc::clone(&self.evaluator);
                async move {
                    let summary = evaluator.run_tick().await?;
                    if summary.evaluated > 0 {
                        debug!(?summary, "Evaluate tick");
                    }
                    Ok(())
                }
            },
        );
        let monitor = run_loop(
            MONITOR_LOOP,
            self.config.monitor_interval(),
            tick_budget,
            shutdown,
            || {
                let monitor = Arc::clone(&self.monitor);
                async move {
                    let summary = monitor.run_tick().await?;
                    if summary.polled > 0 {
                        debug!(?summary, "Monitor tick");
                    }
                    monitor.refresh_gauges().await
                }
            },
        );

        let (evaluate_ticks, monitor_ticks) = tokio::join!(evaluate, monitor);
        let report = SchedulerReport {
            evaluate_ticks,
            monitor_ticks,
        };
        info!(?report, "Scheduler stopped");
        report
    }

    /// Run on a background task.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<SchedulerReport> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

/// Tick `tick` every `period` until cancelled. Returns completed ticks.
///
/// Each tick runs to completion; one that outlasts `tick_budget` is logged.
async fn run_loop<F, Fut>(
    loop_name: &'static str,
    period: Duration,
    tick_budget: Duration,
    shutdown: CancellationToken,
    mut tick: F,
) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<()>>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let started = Instant::now();
        if let Err(e) = tick().await {
            warn!(loop_name, error = %e, "Tick failed");
        }
        let elapsed = started.elapsed();
        if elapsed > tick_budget {
            debug!(
                loop_name,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "Tick ran past its budget"
            );
        }
        Metrics::tick_duration(loop_name, elapsed.as_secs_f64() * 1_000.0);
        ticks += 1;
    }

    debug!(loop_name, ticks, "Loop stopped");
    ticks
}

//! Prometheus metrics for the tonlimit engine.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, Encoder, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Orders checked against a fresh quote.
pub static ORDERS_EVALUATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tonlimit_orders_evaluated_total",
        "Total CREATED orders evaluated against a quote"
    )
    .unwrap()
});

/// Trigger conditions met.
/// Labels: side (BUY/SELL)
pub static TRIGGERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tonlimit_triggers_total",
        "Total orders whose trigger condition was met",
        &["side"]
    )
    .unwrap()
});

/// Quote failures.
/// Labels: reason (unavailable/invalid_response/invalid_rate/timeout)
pub static QUOTE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tonlimit_quote_failures_total",
        "Total failed price quotes",
        &["reason"]
    )
    .unwrap()
});

/// Dispatch attempt outcomes.
pub static DISPATCH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tonlimit_dispatch_total",
        "Dispatch attempts by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Submissions whose claim lost to a concurrent writer.
pub static LOST_CLAIMS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tonlimit_lost_claims_total",
        "Submitted swaps whose CREATED->PENDING claim affected no row"
    )
    .unwrap()
});

/// Settlement poll outcomes.
pub static SETTLEMENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tonlimit_settlement_total",
        "Settlement polls by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Tick duration in milliseconds.
/// Labels: loop (evaluate/monitor)
pub static TICK_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tonlimit_tick_duration_ms",
        "Scheduler tick duration in milliseconds",
        &["loop"],
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 30000.0]
    )
    .unwrap()
});

/// Ticks that ran out of budget and carried orders over.
pub static TICK_OVERRUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tonlimit_tick_overruns_total",
        "Scheduler ticks that carried unstarted orders over to the next tick",
        &["loop"]
    )
    .unwrap()
});

/// Orders per status.
pub static ORDERS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("tonlimit_orders", "Orders currently in each status", &["status"])
        .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record an order evaluation.
    pub fn order_evaluated() {
        ORDERS_EVALUATED_TOTAL.inc();
    }

    /// Record a met trigger.
    pub fn triggered(side: &str) {
        TRIGGERS_TOTAL.with_label_values(&[side]).inc();
    }

    /// Record a failed quote.
    pub fn quote_failed(reason: &str) {
        QUOTE_FAILURES_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a dispatch outcome.
    pub fn dispatch(outcome: &str) {
        DISPATCH_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a lost claim (possible duplicate submission).
    pub fn lost_claim() {
        LOST_CLAIMS_TOTAL.inc();
    }

    /// Record a settlement poll outcome.
    pub fn settlement(outcome: &str) {
        SETTLEMENT_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record tick duration.
    pub fn tick_duration(loop_name: &str, duration_ms: f64) {
        TICK_DURATION_MS
            .with_label_values(&[loop_name])
            .observe(duration_ms);
    }

    /// Record a tick that ran out of budget.
    pub fn tick_overrun(loop_name: &str) {
        TICK_OVERRUNS_TOTAL.with_label_values(&[loop_name]).inc();
    }

    /// Set the order count for one status.
    pub fn orders_in_status(status: &str, count: i64) {
        ORDERS.with_label_values(&[status]).set(count);
    }
}

/// Encode all registered metrics in the Prometheus text format.
pub fn render_metrics() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}

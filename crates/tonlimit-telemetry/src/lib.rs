//! Prometheus metrics and structured logging for tonlimit.
//!
//! - `init_logging`: tracing subscriber (JSON in production, pretty otherwise)
//! - `Metrics`: facade over the engine's Prometheus series
//! - `render_metrics`: text exposition for the `/metrics` endpoint

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, DEFAULT_LOG_FILTER};
pub use metrics::{render_metrics, Metrics};

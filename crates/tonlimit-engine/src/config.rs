//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// Evaluate and log triggers, never submit swaps.
    #[default]
    Observation,
    /// Dispatch triggered orders.
    Trading,
}

/// Scheduler and per-call limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: OperatingMode,
    /// Evaluate-and-execute tick period (ms). Default: 1,000.
    #[serde(default = "default_interval_ms")]
    pub evaluate_interval_ms: u64,
    /// Settlement monitor tick period (ms). Default: 1,000.
    #[serde(default = "default_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Per-tick launch budget (ms): orders not started by then lead the
    /// next tick. Default: 30,000.
    #[serde(default = "default_tick_timeout_ms")]
    pub tick_timeout_ms: u64,
    /// Bound on every adapter and store call (ms). Default: 10,000.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Orders processed concurrently within a tick. Default: 8.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Unresolved settlement polls before PENDING -> ERROR. Off by default.
    #[serde(default)]
    pub max_unresolved_polls: Option<u32>,
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_tick_timeout_ms() -> u64 {
    30_000
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::default(),
            evaluate_interval_ms: default_interval_ms(),
            monitor_interval_ms: default_interval_ms(),
            tick_timeout_ms: default_tick_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            max_unresolved_polls: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.evaluate_interval_ms == 0 || self.monitor_interval_ms == 0 {
            return Err(EngineError::Config("tick intervals must be positive".to_string()));
        }
        if self.call_timeout_ms == 0 || self.tick_timeout_ms == 0 {
            return Err(EngineError::Config("timeouts must be positive".to_string()));
        }
        if self.call_timeout_ms > self.tick_timeout_ms {
            return Err(EngineError::Config(format!(
                "call_timeout_ms ({}) exceeds tick_timeout_ms ({})",
                self.call_timeout_ms, self.tick_timeout_ms
            )));
        }
        if self.max_concurrency == 0 {
            return Err(EngineError::Config("max_concurrency must be at least 1".to_string()));
        }
        if self.max_unresolved_polls == Some(0) {
            return Err(EngineError::Config(
                "max_unresolved_polls must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn evaluate_interval(&self) -> Duration {
        Duration::from_millis(self.evaluate_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_millis(self.tick_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

//! Conditional order engine for tonlimit.
//!
//! Turns CREATED orders into submitted swaps once their trigger is met,
//! then follows them to a terminal status.
//!
//! # Key Components
//!
//! - [`Evaluator`]: quotes every CREATED order and applies `should_trigger`
//! - [`Dispatcher`]: restores the signer, submits the swap, claims the order
//! - [`Monitor`]: polls settlement for PENDING orders
//! - [`Scheduler`]: drives the evaluate and monitor loops until shutdown
//!
//! # Dispatch Steps (in `Dispatcher::dispatch`)
//!
//! 1. Owning wallet missing -> ERROR
//! 2. Re-read no longer CREATED or no longer triggered -> Skipped
//! 3. Signer restoration fails -> ERROR if permanent, else error recorded
//! 4. Submission fails -> error recorded, retried next tick
//! 5. Conditional claim CREATED -> PENDING with the tx_ref

mod call;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod monitor;
mod scan;
pub mod scheduler;

pub use config::{EngineConfig, OperatingMode};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{EngineError, EngineResult};
pub use evaluator::{Evaluation, EvaluationSummary, Evaluator};
pub use monitor::{Monitor, MonitorSummary, Settlement};
pub use scheduler::{EngineAdapters, Scheduler, SchedulerReport};

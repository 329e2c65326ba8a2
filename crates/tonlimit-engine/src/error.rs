//! Engine error taxonomy.
//!
//! Every variant is order-local: a failure is logged against one order and
//! never aborts a tick.

use thiserror::Error;
use tonlimit_store::StoreError;
use tonlimit_wallet::{AdapterError, CustodyError, SubmissionError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Oracle, settlement or wallet service unreachable. Retry next tick.
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Signer could not be restored.
    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    /// The wallet service refused the swap. Retry next tick.
    #[error("Swap rejected: {0}")]
    SubmissionRejected(String),

    /// Settlement neither confirmed nor aborted.
    #[error("Settlement ambiguous: {0}")]
    SettlementAmbiguous(String),

    /// External call exceeded the call timeout.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid engine configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Errors that escalate the order to ERROR instead of retrying.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Custody(e) => e.is_permanent(),
            _ => false,
        }
    }

    /// Short label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::AdapterUnavailable(_) => "unavailable",
            Self::Custody(_) => "custody",
            Self::SubmissionRejected(_) => "rejected",
            Self::SettlementAmbiguous(_) => "ambiguous",
            Self::Timeout { .. } => "timeout",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
        }
    }
}

impl From<AdapterError> for EngineError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Unavailable(msg) => Self::AdapterUnavailable(msg),
            AdapterError::InvalidResponse(msg) => {
                Self::AdapterUnavailable(format!("invalid response: {msg}"))
            }
        }
    }
}

impl From<SubmissionError> for EngineError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Rejected(msg) => Self::SubmissionRejected(msg),
            SubmissionError::Unavailable(msg) => Self::AdapterUnavailable(msg),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

//! Adapter error types.
//!
//! Each adapter contract has its own error so the engine can tell transient
//! failures from permanent ones without string matching.

use thiserror::Error;

/// Price oracle and settlement adapter errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Transport failure, 5xx or rate limit. Retry next tick.
    #[error("Adapter unavailable: {0}")]
    Unavailable(String),

    /// The remote answered with something we cannot interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Signer restoration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodyError {
    /// Token could not be decrypted (wrong key, corrupted token).
    #[error("Failed to decrypt wallet secret: {0}")]
    Decrypt(String),

    /// Decrypted secret is not a usable mnemonic.
    #[error("Malformed wallet secret: {0}")]
    MalformedSecret(String),

    /// Custody backend unreachable.
    #[error("Custody unavailable: {0}")]
    Unavailable(String),
}

impl CustodyError {
    /// Permanent errors will not resolve by retrying.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::MalformedSecret(_))
    }
}

/// Swap submission errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// The wallet service refused the swap (4xx).
    #[error("Swap rejected: {0}")]
    Rejected(String),

    /// Transport failure or 5xx.
    #[error("Wallet service unavailable: {0}")]
    Unavailable(String),
}

/// Secret loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client construction errors.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

pub type WalletResult<T> = Result<T, WalletError>;

//! Custodial wallet records.
//!
//! Signing material is held only as encrypted tokens here. Decryption is
//! the custody adapter's job and happens per dispatch attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wallet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub Uuid);

impl WalletId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External user reference (chat user id in the original deployment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(pub i64);

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ciphertext produced by the secret cipher.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedSecret(String);

impl EncryptedSecret {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedSecret([REDACTED; {} bytes])", self.0.len())
    }
}

/// One wallet per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: WalletId,
    pub user: UserRef,
    /// Public address, safe to log.
    pub address: String,
    pub encrypted_secret_key: EncryptedSecret,
    pub encrypted_mnemonic: EncryptedSecret,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    #[must_use]
    pub fn new(
        user: UserRef,
        address: impl Into<String>,
        encrypted_secret_key: EncryptedSecret,
        encrypted_mnemonic: EncryptedSecret,
    ) -> Self {
        Self {
            id: WalletId::new(),
            user,
            address: address.into(),
            encrypted_secret_key,
            encrypted_mnemonic,
            created_at: Utc::now(),
        }
    }
}

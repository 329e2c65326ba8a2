//! Custody: secret loading, encryption at rest and signer restoration.
//!
//! Security notes:
//! - Decrypted material held by this crate lives in `Zeroizing` buffers.
//!   Copies made by the HTTP client while sending it to the wallet service
//!   are outside that guarantee.
//! - `Signer`, `GeneratedWallet` and `FernetCipher` redact themselves in `Debug`.
//! - Never log mnemonic words or cipher keys.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use tonlimit_core::{EncryptedSecret, UserRef, WalletRecord};

use crate::adapter::{BoxFuture, CustodyAdapter};
use crate::error::{CustodyError, KeyError};

// =============================================================================
// KeySource
// =============================================================================

/// Where a process secret (API key, cipher key, database url) is read from.
///
/// In TOML: `{ type = "env_var", var_name = "..." }` or
/// `{ type = "file", path = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeySource {
    /// Load from environment variable (development).
    EnvVar { var_name: String },
    /// Load from file (production, recommend 0600 permissions).
    File { path: PathBuf },
}

impl KeySource {
    /// Read the secret, trimming surrounding whitespace.
    pub fn load(&self) -> Result<Zeroizing<String>, KeyError> {
        let raw = match self {
            KeySource::EnvVar { var_name } => Zeroizing::new(
                std::env::var(var_name).map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
            ),
            KeySource::File { path } => Zeroizing::new(std::fs::read_to_string(path)?),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyError::InvalidKey("secret is empty".to_string()));
        }
        Ok(Zeroizing::new(trimmed.to_string()))
    }
}

// =============================================================================
// SecretCipher
// =============================================================================

/// Symmetric encryption of wallet secrets at rest.
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> EncryptedSecret;

    fn decrypt(&self, token: &EncryptedSecret) -> Result<Zeroizing<String>, CustodyError>;
}

/// Fernet tokens (AES-128-CBC + HMAC-SHA256).
pub struct FernetCipher {
    inner: fernet::Fernet,
}

impl FernetCipher {
    /// Build from a url-safe base64 encoded 32 byte key.
    pub fn new(key: &str) -> Result<Self, KeyError> {
        let inner = fernet::Fernet::new(key.trim()).ok_or_else(|| {
            KeyError::InvalidKey("expected a url-safe base64 encoded 32 byte Fernet key".to_string())
        })?;
        Ok(Self { inner })
    }

    pub fn from_source(source: &KeySource) -> Result<Self, KeyError> {
        let key = source.load()?;
        Self::new(&key)
    }

    /// Generate a fresh random key.
    #[must_use]
    pub fn generate_key() -> String {
        fernet::Fernet::generate_key()
    }
}

impl fmt::Debug for FernetCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FernetCipher([REDACTED])")
    }
}

impl SecretCipher for FernetCipher {
    fn encrypt(&self, plaintext: &str) -> EncryptedSecret {
        EncryptedSecret::new(self.inner.encrypt(plaintext.as_bytes()))
    }

    fn decrypt(&self, token: &EncryptedSecret) -> Result<Zeroizing<String>, CustodyError> {
        let bytes = Zeroizing::new(
            self.inner
                .decrypt(token.as_str())
                .map_err(|e| CustodyError::Decrypt(e.to_string()))?,
        );
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| CustodyError::MalformedSecret("secret is not valid UTF-8".to_string()))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Accepted mnemonic lengths.
pub const MNEMONIC_LENGTHS: [usize; 2] = [12, 24];

/// Split a decrypted mnemonic into words.
///
/// Accepts `;`, `,` and whitespace as separators, since stored wallets use
/// both "; " and ", ".
pub fn parse_mnemonic(secret: &str) -> Result<Zeroizing<Vec<String>>, CustodyError> {
    let words: Zeroizing<Vec<String>> = Zeroizing::new(
        secret
            .split(|c: char| c == ';' || c == ',' || c.is_whitespace())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect(),
    );
    if !MNEMONIC_LENGTHS.contains(&words.len()) {
        return Err(CustodyError::MalformedSecret(format!(
            "mnemonic has {} words, expected 12 or 24",
            words.len()
        )));
    }
    if words
        .iter()
        .any(|w| !w.chars().all(|c| c.is_ascii_lowercase()))
    {
        return Err(CustodyError::MalformedSecret(
            "mnemonic contains non-word characters".to_string(),
        ));
    }
    Ok(words)
}

/// Restored signing material for one dispatch attempt.
///
/// Zeroized on drop.
pub struct Signer {
    address: String,
    mnemonic: Zeroizing<Vec<String>>,
}

impl Signer {
    #[must_use]
    pub fn new(address: impl Into<String>, mnemonic: Zeroizing<Vec<String>>) -> Self {
        Self {
            address: address.into(),
            mnemonic,
        }
    }

    /// Public wallet address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Mnemonic words, for handing to the wallet service only. The request
    /// body built from them is not zeroized.
    pub fn expose_mnemonic(&self) -> &[String] {
        &self.mnemonic
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .field("mnemonic", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// GeneratedWallet
// =============================================================================

/// A freshly generated wallet before its secrets are sealed.
///
/// Zeroized on drop.
pub struct GeneratedWallet {
    address: String,
    secret_key: Zeroizing<String>,
    mnemonic: Zeroizing<Vec<String>>,
}

impl GeneratedWallet {
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        secret_key: Zeroizing<String>,
        mnemonic: Zeroizing<Vec<String>>,
    ) -> Self {
        Self {
            address: address.into(),
            secret_key,
            mnemonic,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Encrypt both secrets into a storable record for `user`.
    ///
    /// The mnemonic is stored ", "-joined and must parse back through
    /// `parse_mnemonic`, so custody can restore it later.
    pub fn seal(
        &self,
        user: UserRef,
        cipher: &dyn SecretCipher,
    ) -> Result<WalletRecord, CustodyError> {
        if self.address.trim().is_empty() {
            return Err(CustodyError::MalformedSecret(
                "generated wallet has no address".to_string(),
            ));
        }
        if self.secret_key.trim().is_empty() {
            return Err(CustodyError::MalformedSecret(
                "generated wallet has no secret key".to_string(),
            ));
        }
        let joined = Zeroizing::new(self.mnemonic.join(", "));
        parse_mnemonic(&joined)?;
        Ok(WalletRecord::new(
            user,
            self.address.clone(),
            cipher.encrypt(&self.secret_key),
            cipher.encrypt(&joined),
        ))
    }
}

impl fmt::Debug for GeneratedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedWallet")
            .field("address", &self.address)
            .field("secret_key", &"[REDACTED]")
            .field("mnemonic", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// MnemonicCustody
// =============================================================================

/// Custody adapter decrypting the wallet's stored mnemonic.
pub struct MnemonicCustody {
    cipher: Arc<dyn SecretCipher>,
}

impl MnemonicCustody {
    #[must_use]
    pub fn new(cipher: Arc<dyn SecretCipher>) -> Self {
        Self { cipher }
    }
}

impl CustodyAdapter for MnemonicCustody {
    fn restore_signer(&self, wallet: &WalletRecord) -> BoxFuture<'_, Result<Signer, CustodyError>> {
        let address = wallet.address.clone();
        let token = wallet.encrypted_mnemonic.clone();
        let wallet_id = wallet.id;
        Box::pin(async move {
            if token.is_empty() {
                return Err(CustodyError::MalformedSecret(
                    "wallet has no stored mnemonic".to_string(),
                ));
            }
            let secret = self.cipher.decrypt(&token)?;
            let words = parse_mnemonic(&secret)?;
            debug!(%wallet_id, %address, "Signer restored");
            Ok(Signer::new(address, words))
        })
    }
}

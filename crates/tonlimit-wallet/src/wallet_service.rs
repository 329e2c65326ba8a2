//! Wallet service client: wallet generation, swap construction, signing
//! and broadcast.
//!
//! Signer material crosses this connection in both directions (request
//! bodies for swaps, response bodies for new wallets). The HTTP client's
//! own buffers are not zeroized, so the service must sit on a loopback or
//! private network address.

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info};
use zeroize::Zeroizing;

use tonlimit_core::{AssetRef, OrderId, OrderSide, TxRef, Volume};

use crate::adapter::{BoxFuture, SwapAdapter, SwapRequest, WalletProvisioner};
use crate::custody::{GeneratedWallet, Signer};
use crate::error::{AdapterError, SubmissionError, WalletError, WalletResult};

/// Default timeout for swap submission.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct SwapBody<'a> {
    idempotency_key: OrderId,
    side: OrderSide,
    asset: &'a AssetRef,
    amount: Volume,
    wallet_address: &'a str,
    mnemonic: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    tx_ref: String,
}

#[derive(Deserialize)]
struct NewWalletResponse {
    address: String,
    secret_key: String,
    mnemonic: Vec<String>,
}

/// Client for the wallet service `POST /v1/swaps` and `POST /v1/wallets`
/// endpoints.
pub struct WalletServiceClient {
    client: Client,
    swaps_url: Url,
    wallets_url: Url,
}

impl WalletServiceClient {
    /// Create a new client. Refuses public endpoints.
    pub fn new(base_url: &str) -> WalletResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> WalletResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| WalletError::HttpClient(format!("Invalid wallet service URL: {e}")))?;
        if !is_private_host(&base) {
            return Err(WalletError::HttpClient(format!(
                "Wallet service must be on a private or loopback address, got {base}"
            )));
        }
        let endpoint = |path: &str| {
            base.join(path)
                .map_err(|e| WalletError::HttpClient(format!("Invalid wallet service URL: {e}")))
        };
        let swaps_url = endpoint("/v1/swaps")?;
        let wallets_url = endpoint("/v1/wallets")?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        info!(url = %base, "Wallet service client ready");
        Ok(Self {
            client,
            swaps_url,
            wallets_url,
        })
    }
}

/// Loopback, RFC 1918 / unique-local addresses, `localhost`, or a
/// single-label service name.
fn is_private_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => v4.is_loopback() || v4.is_private(),
            IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
        };
    }
    host == "localhost" || !host.contains('.')
}

impl SwapAdapter for WalletServiceClient {
    fn submit_swap(
        &self,
        signer: Signer,
        request: SwapRequest,
    ) -> BoxFuture<'_, Result<TxRef, SubmissionError>> {
        Box::pin(async move {
            let body = SwapBody {
                idempotency_key: request.idempotency_key,
                side: request.side,
                asset: &request.asset,
                amount: request.amount,
                wallet_address: signer.address(),
                mnemonic: signer.expose_mnemonic(),
            };

            let response = self
                .client
                .post(self.swaps_url.clone())
                .header("Idempotency-Key", request.idempotency_key.to_string())
                .json(&body)
                .send()
                .await
                .map_err(|e| SubmissionError::Unavailable(format!("HTTP request failed: {e}")))?;
            drop(signer);

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(classify_status(status, text));
            }

            let parsed: SwapResponse = response.json().await.map_err(|e| {
                SubmissionError::Unavailable(format!("Failed to parse swap response: {e}"))
            })?;
            if parsed.tx_ref.trim().is_empty() {
                return Err(SubmissionError::Unavailable(
                    "wallet service returned an empty tx_ref".to_string(),
                ));
            }

            debug!(order_id = %request.idempotency_key, tx_ref = %parsed.tx_ref, "Swap submitted");
            Ok(TxRef::new(parsed.tx_ref))
        })
    }
}

impl WalletProvisioner for WalletServiceClient {
    fn create_wallet(&self) -> BoxFuture<'_, Result<GeneratedWallet, AdapterError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.wallets_url.clone())
                .send()
                .await
                .map_err(|e| AdapterError::Unavailable(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    AdapterError::Unavailable(format!("HTTP {status}: {text}"))
                } else {
                    AdapterError::InvalidResponse(format!("HTTP {status}: {text}"))
                });
            }

            let parsed: NewWalletResponse = response.json().await.map_err(|e| {
                AdapterError::InvalidResponse(format!("Failed to parse new wallet: {e}"))
            })?;
            let wallet = GeneratedWallet::new(
                parsed.address,
                Zeroizing::new(parsed.secret_key),
                Zeroizing::new(parsed.mnemonic),
            );
            info!(address = %wallet.address(), "Wallet generated");
            Ok(wallet)
        })
    }
}

fn classify_status(status: StatusCode, body: String) -> SubmissionError {
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        SubmissionError::Rejected(format!("HTTP {status}: {body}"))
    } else {
        SubmissionError::Unavailable(format!("HTTP {status}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private(url: &str) -> bool {
        is_private_host(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_private_hosts_accepted() {
        assert!(private("http://127.0.0.1:8081"));
        assert!(private("http://localhost:8081"));
        assert!(private("http://10.0.3.7"));
        assert!(private("http://192.168.1.2:9000"));
        assert!(private("http://[::1]:8081"));
        assert!(private("http://wallet-service:8081"));
    }

    #[test]
    fn test_public_hosts_refused() {
        assert!(!private("https://example.com"));
        assert!(!private("http://8.8.8.8"));
        assert!(WalletServiceClient::new("https://wallet.example.com").is_err());
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            SubmissionError::Rejected(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            SubmissionError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            SubmissionError::Unavailable(_)
        ));
    }
}

//! TON API client: exchange rates and transaction status.

use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use tonlimit_core::{AssetRef, OrderSide, Quote, TxRef, TxStatus, Volume};
use zeroize::Zeroizing;

use crate::adapter::{BoxFuture, PriceOracle, SettlementAdapter};
use crate::error::{AdapterError, WalletError, WalletResult};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Rates are rounded to the nano-TON.
const RATE_SCALE: u32 = 9;

/// Default public endpoint.
pub const DEFAULT_TONAPI_URL: &str = "https://tonapi.io";

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    rates: HashMap<String, TokenRates>,
}

#[derive(Debug, Deserialize)]
struct TokenRates {
    #[serde(default)]
    prices: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    aborted: bool,
    #[serde(default)]
    destroyed: bool,
}

impl TransactionResponse {
    fn status(&self) -> TxStatus {
        if self.success {
            TxStatus::Confirmed
        } else if self.aborted || self.destroyed {
            TxStatus::Aborted
        } else {
            TxStatus::Pending
        }
    }
}

/// Client for the TON API REST endpoints.
pub struct TonApiClient {
    client: Client,
    base_url: String,
    api_key: Option<Zeroizing<String>>,
}

impl TonApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://tonapi.io" or "https://testnet.tonapi.io")
    /// * `api_key` - Optional bearer token
    pub fn new(base_url: impl Into<String>, api_key: Option<Zeroizing<String>>) -> WalletResult<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<Zeroizing<String>>,
        timeout: Duration,
    ) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key.as_str()),
            None => request,
        }
    }

    /// Rate of one unit of `asset` in TON.
    pub async fn fetch_rate(&self, asset: &AssetRef) -> Result<Decimal, AdapterError> {
        let url = format!("{}/v2/rates", self.base_url);
        let response = self
            .get(&url)
            .query(&[("tokens", asset.as_str()), ("currencies", "ton")])
            .send()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: RatesResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(format!("Failed to parse rates: {e}")))?;

        extract_rate(&body, asset.as_str())
    }

    /// Chain status of a transaction. Unknown transactions are pending.
    pub async fn fetch_transaction_status(&self, tx_ref: &TxRef) -> Result<TxStatus, AdapterError> {
        let url = format!("{}/v2/blockchain/transactions/{}", self.base_url, tx_ref);
        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%tx_ref, "Transaction not indexed yet");
            return Ok(TxStatus::Pending);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: TransactionResponse = response.json().await.map_err(|e| {
            AdapterError::InvalidResponse(format!("Failed to parse transaction: {e}"))
        })?;
        Ok(body.status())
    }
}

fn classify_status(status: StatusCode, body: String) -> AdapterError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AdapterError::Unavailable(format!("HTTP {status}: {body}"))
    } else {
        AdapterError::InvalidResponse(format!("HTTP {status}: {body}"))
    }
}

/// Pick the TON price for `token` out of a rates response.
///
/// The API may echo the token in a normalized address form, so a single
/// entry is accepted even when its key differs.
fn extract_rate(body: &RatesResponse, token: &str) -> Result<Decimal, AdapterError> {
    let entry = match body.rates.get(token) {
        Some(entry) => entry,
        None if body.rates.len() == 1 => body
            .rates
            .values()
            .next()
            .ok_or_else(|| AdapterError::InvalidResponse("empty rates".to_string()))?,
        None => {
            return Err(AdapterError::InvalidResponse(format!(
                "no rate for token {token}"
            )))
        }
    };

    let value = entry
        .prices
        .iter()
        .find(|(currency, _)| currency.eq_ignore_ascii_case("ton"))
        .map(|(_, value)| value)
        .ok_or_else(|| AdapterError::InvalidResponse(format!("no TON price for {token}")))?;

    let rate = match value {
        serde_json::Value::Number(n) => n.as_f64().and_then(Decimal::from_f64),
        serde_json::Value::String(s) => s.parse::<Decimal>().ok(),
        _ => None,
    }
    .ok_or_else(|| AdapterError::InvalidResponse(format!("unparseable rate {value}")))?;

    Ok(rate.round_dp(RATE_SCALE))
}

impl PriceOracle for TonApiClient {
    fn quote(
        &self,
        side: OrderSide,
        asset: &AssetRef,
        amount: Volume,
    ) -> BoxFuture<'_, Result<Quote, AdapterError>> {
        let asset = asset.clone();
        Box::pin(async move {
            let rate = self.fetch_rate(&asset).await?;
            if rate <= Decimal::ZERO {
                warn!(%asset, %rate, "Non-positive rate from TON API");
            }
            Ok(Quote {
                side,
                asset,
                amount,
                rate,
                quoted_at: Utc::now(),
            })
        })
    }
}

impl SettlementAdapter for TonApiClient {
    fn poll_status(&self, tx_ref: &TxRef) -> BoxFuture<'_, Result<TxStatus, AdapterError>> {
        let tx_ref = tx_ref.clone();
        Box::pin(async move { self.fetch_transaction_status(&tx_ref).await })
    }
}

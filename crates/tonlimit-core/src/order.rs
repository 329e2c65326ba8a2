//! Order record, identifiers and the order state machine.
//!
//! The status graph is encoded once, in [`OrderStatus::can_transition_to`].
//! Store implementations consult it before applying any conditional update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;
use crate::wallet::WalletId;
use crate::{Price, Volume};

/// Opaque unique order identifier.
///
/// Also used as the idempotency key for swap submission, so a retried
/// submission for the same order can be collapsed by the wallet service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub Uuid);

impl OrderId {
    /// Create a new random order ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Order side relative to the target asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    /// Acquire the target asset, paying base asset.
    Buy,
    /// Liquidate the target asset for base asset.
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(CoreError::UnknownSide(other.to_string())),
        }
    }
}

/// Lifecycle status of an order.
///
/// ```text
/// CREATED -> PENDING -> EXECUTED | FAILED | ERROR
/// CREATED -> ERROR
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Waiting for the trigger condition.
    #[default]
    Created,
    /// Swap submitted, awaiting settlement.
    Pending,
    /// Settlement confirmed on chain.
    Executed,
    /// Transaction aborted or destroyed on chain.
    Failed,
    /// Unrecoverable dispatch error or stale settlement, needs an operator.
    Error,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Created,
        Self::Pending,
        Self::Executed,
        Self::Failed,
        Self::Error,
    ];

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Failed | Self::Error)
    }

    /// Returns true if `next` is an edge of the order state graph.
    #[must_use]
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Pending)
                | (Self::Created, Self::Error)
                | (Self::Pending, Self::Executed)
                | (Self::Pending, Self::Failed)
                | (Self::Pending, Self::Error)
        )
    }

    /// Validate a transition, returning the illegal edge as an error.
    pub fn check_transition(&self, next: OrderStatus) -> crate::Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::IllegalTransition {
                from: *self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::Executed => "EXECUTED",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "PENDING" => Ok(Self::Pending),
            "EXECUTED" => Ok(Self::Executed),
            "FAILED" => Ok(Self::Failed),
            "ERROR" => Ok(Self::Error),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Target asset reference (jetton master address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

impl AssetRef {
    /// Create an asset reference, rejecting blank input.
    pub fn new(s: impl Into<String>) -> crate::Result<Self> {
        let s = s.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidAsset("asset reference is empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-chain transaction reference returned by the swap adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chain status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Not yet indexed or not yet final.
    Pending,
    /// Executed successfully.
    Confirmed,
    /// Aborted or destroyed.
    Aborted,
}

impl TxStatus {
    /// Order status this chain status settles to, if any.
    #[must_use]
    pub fn settled_status(&self) -> Option<OrderStatus> {
        match self {
            Self::Pending => None,
            Self::Confirmed => Some(OrderStatus::Executed),
            Self::Aborted => Some(OrderStatus::Failed),
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// A conditional trade order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Owning wallet. Never changes after creation.
    pub wallet_id: WalletId,
    pub side: OrderSide,
    /// Trigger threshold.
    pub price: Price,
    pub volume: Volume,
    pub asset: AssetRef,
    pub status: OrderStatus,
    /// Set once, on CREATED -> PENDING.
    pub tx_ref: Option<TxRef>,
    /// Settlement polls that returned neither confirmed nor aborted.
    pub unresolved_polls: u32,
    /// Last per-order dispatch or settlement error.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a fresh CREATED order from a validated request.
    pub fn from_new(new: NewOrder, now: DateTime<Utc>) -> crate::Result<Self> {
        new.validate()?;
        Ok(Self {
            id: OrderId::new(),
            wallet_id: new.wallet_id,
            side: new.side,
            price: new.price,
            volume: new.volume,
            asset: new.asset,
            status: OrderStatus::Created,
            tx_ref: None,
            unresolved_polls: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Price, volume and asset may only change while CREATED.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.status == OrderStatus::Created
    }

    /// Apply a status update in memory, enforcing the state graph.
    ///
    /// Used by the in-memory store; the SQL store expresses the same
    /// rules in its `WHERE` clause.
    pub fn apply_update(&mut self, update: &StatusUpdate, now: DateTime<Utc>) -> crate::Result<()> {
        self.status.check_transition(update.status)?;
        if let Some(tx_ref) = &update.tx_ref {
            if self.tx_ref.is_some() || update.status != OrderStatus::Pending {
                return Err(CoreError::IllegalTransition {
                    from: self.status,
                    to: update.status,
                });
            }
            self.tx_ref = Some(tx_ref.clone());
        }
        self.status = update.status;
        if update.last_error.is_some() {
            self.last_error = update.last_error.clone();
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Request to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub wallet_id: WalletId,
    pub side: OrderSide,
    pub price: Price,
    pub volume: Volume,
    pub asset: AssetRef,
}

impl NewOrder {
    pub fn validate(&self) -> crate::Result<()> {
        validate_price(self.price)?;
        validate_volume(self.volume)
    }
}

/// Partial edit of a CREATED order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub volume: Option<Volume>,
    #[serde(default)]
    pub asset: Option<AssetRef>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.volume.is_none() && self.asset.is_none()
    }

    pub fn validate(&self) -> crate::Result<()> {
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(volume) = self.volume {
            validate_volume(volume)?;
        }
        Ok(())
    }

    /// Apply to an order. Caller must have checked `Order::is_editable`.
    pub fn apply(&self, order: &mut Order, now: DateTime<Utc>) {
        if let Some(price) = self.price {
            order.price = price;
        }
        if let Some(volume) = self.volume {
            order.volume = volume;
        }
        if let Some(asset) = &self.asset {
            order.asset = asset.clone();
        }
        order.updated_at = now;
    }
}

/// Fields written by a conditional status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tx_ref: Option<TxRef>,
    pub last_error: Option<String>,
}

impl StatusUpdate {
    /// CREATED -> PENDING with the submitted transaction.
    pub fn claim(tx_ref: TxRef) -> Self {
        Self {
            status: OrderStatus::Pending,
            tx_ref: Some(tx_ref),
            last_error: None,
        }
    }

    /// PENDING -> EXECUTED | FAILED.
    pub fn settle(status: OrderStatus) -> Self {
        Self {
            status,
            tx_ref: None,
            last_error: None,
        }
    }

    /// Any -> ERROR with the reason recorded.
    pub fn escalate(reason: impl Into<String>) -> Self {
        Self {
            status: OrderStatus::Error,
            tx_ref: None,
            last_error: Some(reason.into()),
        }
    }
}

fn validate_price(price: Price) -> crate::Result<()> {
    if !price.is_positive() {
        return Err(CoreError::InvalidPrice(format!("{price} must be positive")));
    }
    Ok(())
}

fn validate_volume(volume: Volume) -> crate::Result<()> {
    if !volume.is_positive() {
        return Err(CoreError::InvalidVolume(format!("{volume} must be positive")));
    }
    Ok(())
}

//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tonlimit_core::{
    AssetRef, NewOrder, Order, OrderId, OrderPatch, OrderSide, OrderStatus, Price, TxRef, Volume,
    WalletId, WalletRecord,
};

use crate::error::{ApiError, ApiResult};

/// `POST /api/orders/{user_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub side: OrderSide,
    pub price: Price,
    pub volume: Volume,
    pub asset: String,
}

impl CreateOrderRequest {
    pub fn into_new_order(self, wallet_id: WalletId) -> ApiResult<NewOrder> {
        let new = NewOrder {
            wallet_id,
            side: self.side,
            price: self.price,
            volume: self.volume,
            asset: AssetRef::new(self.asset)?,
        };
        new.validate()?;
        Ok(new)
    }
}

/// `PUT /api/orders/{user_id}/{order_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub volume: Option<Volume>,
    #[serde(default)]
    pub asset: Option<String>,
}

impl UpdateOrderRequest {
    pub fn into_patch(self) -> ApiResult<OrderPatch> {
        let patch = OrderPatch {
            price: self.price,
            volume: self.volume,
            asset: self.asset.map(AssetRef::new).transpose()?,
        };
        if patch.is_empty() {
            return Err(ApiError::Invalid(
                "at least one of price, volume, asset is required".to_string(),
            ));
        }
        patch.validate()?;
        Ok(patch)
    }
}

/// Public wallet details. Secrets never leave the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletResponse {
    pub user_id: i64,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl From<WalletRecord> for WalletResponse {
    fn from(wallet: WalletRecord) -> Self {
        Self {
            user_id: wallet.user.0,
            address: wallet.address,
            created_at: wallet.created_at,
        }
    }
}

/// Order as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub side: OrderSide,
    pub price: Price,
    pub volume: Volume,
    pub asset: String,
    pub status: OrderStatus,
    pub tx_ref: Option<TxRef>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            side: order.side,
            price: order.price,
            volume: order.volume,
            asset: order.asset.as_str().to_string(),
            status: order.status,
            tx_ref: order.tx_ref,
            last_error: order.last_error,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

//! Price quotes and the trigger rule.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{AssetRef, OrderSide};
use crate::{Price, Volume};

/// Instantaneous exchange rate for a (side, asset, amount) triple.
///
/// Never persisted; requested fresh on every evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub side: OrderSide,
    pub asset: AssetRef,
    pub amount: Volume,
    /// Base asset per one unit of target asset.
    pub rate: Decimal,
    pub quoted_at: DateTime<Utc>,
}

impl Quote {
    /// A quote with a non-positive rate is unusable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.rate > Decimal::ZERO
    }
}

/// Decide whether an order fires at the quoted rate.
///
/// BUY fires when the market is at least as cheap as the target
/// (`rate <= price`), SELL when it is at least as rich (`rate >= price`).
/// A non-positive rate never fires.
#[must_use]
pub fn should_trigger(side: OrderSide, rate: Decimal, price: Price) -> bool {
    if rate <= Decimal::ZERO {
        return false;
    }
    match side {
        OrderSide::Buy => rate <= price.inner(),
        OrderSide::Sell => rate >= price.inner(),
    }
}

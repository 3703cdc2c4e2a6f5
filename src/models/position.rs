//! The single open spot position.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spot holding opened by an acknowledged market BUY.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Price at which the buy was issued
    pub buy_price: Decimal,

    /// Base asset amount bought, as sent to the exchange
    pub amount: Decimal,

    /// When the buy was acknowledged
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn new(buy_price: Decimal, amount: Decimal, opened_at: DateTime<Utc>) -> Self {
        Self {
            buy_price,
            amount,
            opened_at,
        }
    }

    /// P&L in quote currency if the position were closed at `price`.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        (price - self.buy_price) * self.amount
    }
}

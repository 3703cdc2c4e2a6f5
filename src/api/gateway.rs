//! Interfaces to the external collaborators the trading loop depends on.
//!
//! The loop only ever talks to these traits; concrete adapters live in the
//! sibling modules.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{Candle, TradeSide};

use super::GatewayResult;

/// Exchange acknowledgment of a submitted order.
///
/// This is not a fill confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: Option<String>,
    pub client_order_id: String,
    /// Quantity actually sent after truncation
    pub quantity: Decimal,
}

/// Free and locked balance of one asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub free: Decimal,
    pub locked: Decimal,
}

/// One text message received on the command channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandUpdate {
    /// Monotonically increasing update identifier
    pub update_id: i64,
    pub chat_id: Option<i64>,
    pub text: String,
}

/// Result of one command poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBatch {
    /// Text commands, oldest first
    pub updates: Vec<CommandUpdate>,
    /// Highest update id seen, including updates that carried no command
    pub last_update_id: Option<i64>,
}

#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Latest traded price for `symbol`.
    async fn get_price(&self, symbol: &str) -> GatewayResult<Decimal>;

    /// The most recent `limit` candles, oldest first.
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> GatewayResult<Vec<Candle>>;
}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
    ) -> GatewayResult<OrderAck>;
}

#[async_trait]
pub trait AccountGateway: Send + Sync {
    /// Balance of `asset`, or `None` if the account holds no entry for it.
    async fn get_balance(&self, asset: &str) -> GatewayResult<Option<Balance>>;
}

#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Updates with an id strictly greater than `after`, oldest first.
    async fn poll_updates(&self, after: Option<i64>) -> GatewayResult<CommandBatch>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, text: &str) -> GatewayResult<()>;
}

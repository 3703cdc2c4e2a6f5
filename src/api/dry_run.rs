//! Order gateway that acknowledges without touching the exchange.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::models::TradeSide;

use super::exchange_client::checked_quantity;
use super::gateway::{OrderAck, OrderGateway};
use super::GatewayResult;

/// Logs the order it would have sent and returns a synthetic ack.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunOrders;

#[async_trait]
impl OrderGateway for DryRunOrders {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
    ) -> GatewayResult<OrderAck> {
        let quantity = checked_quantity(quantity)?;
        let client_order_id = uuid::Uuid::new_v4().simple().to_string();
        info!(
            "[DRY RUN] Would place MARKET {} {} qty={} ({})",
            side, symbol, quantity, client_order_id
        );

        Ok(OrderAck {
            order_id: None,
            client_order_id,
            quantity,
        })
    }
}

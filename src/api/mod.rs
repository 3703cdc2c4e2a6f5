//! Gateways to the exchange and the Telegram bot, plus the traits the
//! trading loop is written against.

mod dry_run;
mod error;
mod exchange_client;
mod gateway;
mod telegram_client;
mod types;

pub use dry_run::DryRunOrders;
pub use error::{with_timeout, GatewayError, GatewayResult};
pub use exchange_client::{Credentials, ExchangeClient, MEXC_API_BASE};
pub use gateway::{
    AccountGateway, Balance, CommandBatch, CommandChannel, CommandUpdate, MarketDataGateway,
    NotificationSink, OrderAck, OrderGateway,
};
pub use telegram_client::{TelegramClient, TELEGRAM_API_BASE};
pub use types::*;

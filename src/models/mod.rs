//! Data models for candles, the open position and trade records.

mod candle;
mod position;
mod trade;

pub use candle::Candle;
pub use position::Position;
pub use trade::{TradeLedger, TradeRecord, TradeSide};

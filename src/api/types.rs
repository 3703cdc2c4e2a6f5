//! Wire types for the exchange REST API and the Telegram Bot API.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Candle;

use super::GatewayError;

/// Response from /api/v3/ticker/price.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: Decimal,
}

/// Response from /api/v3/account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    #[serde(default)]
    pub balances: Vec<AssetBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

/// Response from POST /api/v3/order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderResponse {
    /// Numeric on some venues, string on others
    #[serde(default)]
    pub order_id: Value,
    #[serde(default)]
    pub client_order_id: Option<String>,
}

impl NewOrderResponse {
    pub fn order_id(&self) -> Option<String> {
        match &self.order_id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One raw kline row: `[openTime, open, high, low, close, volume, closeTime, ...]`.
pub type KlineRow = Vec<Value>;

/// Parse a raw kline row into a [`Candle`].
pub fn parse_kline(row: &KlineRow) -> Result<Candle, GatewayError> {
    if row.len() < 7 {
        return Err(GatewayError::Decode(format!(
            "kline row has {} fields, expected at least 7",
            row.len()
        )));
    }

    let time = |v: &Value| -> Result<chrono::DateTime<Utc>, GatewayError> {
        let ms = v
            .as_i64()
            .ok_or_else(|| GatewayError::Decode(format!("bad kline time: {}", v)))?;
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| GatewayError::Decode(format!("kline time out of range: {}", ms)))
    };
    let num = |v: &Value| -> Result<f64, GatewayError> {
        match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
        .ok_or_else(|| GatewayError::Decode(format!("bad kline number: {}", v)))
    };

    Ok(Candle {
        open_time: time(&row[0])?,
        open: num(&row[1])?,
        high: num(&row[2])?,
        low: num(&row[3])?,
        close: num(&row[4])?,
        volume: num(&row[5])?,
        close_time: time(&row[6])?,
    })
}

// ==================== Telegram ====================

/// Envelope of every Bot API response.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// Query for getUpdates.
#[derive(Debug, Clone, Serialize)]
pub struct GetUpdatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
}

/// Body for sendMessage.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageParams<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'static str,
}

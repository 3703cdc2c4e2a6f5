//! Spot exchange REST client (MEXC v3 API, Binance-compatible shape).
//!
//! Public endpoints (price, klines) are unauthenticated. Account and order
//! endpoints carry a millisecond timestamp and an HMAC-SHA256 signature over
//! the canonical query string, plus the API key header.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, info};

use crate::models::{Candle, TradeSide};

use super::gateway::{AccountGateway, Balance, MarketDataGateway, OrderAck, OrderGateway};
use super::types::*;
use super::{GatewayError, GatewayResult};

type HmacSha256 = Hmac<Sha256>;

pub const MEXC_API_BASE: &str = "https://api.mexc.com";
const API_KEY_HEADER: &str = "X-MEXC-APIKEY";
const RECV_WINDOW_MS: u64 = 5000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// API credentials for signed endpoints.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// REST client for market data, account and order endpoints.
pub struct ExchangeClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl ExchangeClient {
    /// Client for public endpoints only.
    pub fn public(base_url: impl Into<String>) -> GatewayResult<Self> {
        Self::build(base_url.into(), None)
    }

    /// Client able to call signed endpoints.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> GatewayResult<Self> {
        Self::build(base_url.into(), Some(credentials))
    }

    fn build(base_url: String, credentials: Option<Credentials>) -> GatewayResult<Self> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn credentials(&self) -> GatewayResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| GatewayError::Status {
                status: 401,
                body: "no API credentials configured".to_string(),
            })
    }

    /// Append timestamp/recvWindow to `params` and sign the result.
    ///
    /// Returns the full query string including `&signature=...`.
    fn signed_query(&self, params: &str) -> GatewayResult<String> {
        let credentials = self.credentials()?;
        let timestamp = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("recvWindow={}&timestamp={}", RECV_WINDOW_MS, timestamp)
        } else {
            format!("{}&recvWindow={}&timestamp={}", params, RECV_WINDOW_MS, timestamp)
        };
        let signature = sign(&credentials.api_secret, &query);
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Hex-encoded HMAC-SHA256 of `payload` keyed with `secret`.
pub fn sign(secret: &str, payload: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Truncate (not round) a base quantity to the 2 decimals the venue accepts.
pub fn truncate_quantity(quantity: Decimal) -> Decimal {
    quantity.trunc_with_scale(2).normalize()
}

/// Truncated quantity, or an error naming the requested amount if nothing is left.
pub fn checked_quantity(quantity: Decimal) -> GatewayResult<Decimal> {
    let truncated = truncate_quantity(quantity);
    if truncated <= Decimal::ZERO {
        return Err(GatewayError::InvalidQuantity(format!(
            "{} truncates to zero at 2 decimals",
            quantity
        )));
    }
    Ok(truncated)
}

#[async_trait]
impl MarketDataGateway for ExchangeClient {
    async fn get_price(&self, symbol: &str) -> GatewayResult<Decimal> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?;

        let ticker: TickerPrice = Self::decode(response).await?;
        if ticker.price <= Decimal::ZERO {
            return Err(GatewayError::Decode(format!(
                "non-positive price for {}: {}",
                ticker.symbol, ticker.price
            )));
        }
        Ok(ticker.price)
    }

    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> GatewayResult<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        debug!(symbol = %symbol, interval = %interval, limit = limit, "Fetching klines");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<KlineRow> = Self::decode(response).await?;
        rows.iter().map(parse_kline).collect()
    }
}

#[async_trait]
impl OrderGateway for ExchangeClient {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
    ) -> GatewayResult<OrderAck> {
        let quantity = checked_quantity(quantity)?;
        let client_order_id = uuid::Uuid::new_v4().simple().to_string();
        let params = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}",
            symbol,
            side.as_str(),
            quantity,
            client_order_id
        );
        let query = self.signed_query(&params)?;
        let url = format!("{}/api/v3/order?{}", self.base_url, query);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.credentials()?.api_key)
            .send()
            .await?;

        let placed: NewOrderResponse = Self::decode(response).await?;
        let order_id = placed.order_id();

        info!(
            symbol = %symbol,
            side = %side,
            quantity = %quantity,
            order_id = ?order_id,
            "Market order acknowledged"
        );

        Ok(OrderAck {
            order_id,
            client_order_id: placed.client_order_id.unwrap_or(client_order_id),
            quantity,
        })
    }
}

#[async_trait]
impl AccountGateway for ExchangeClient {
    async fn get_balance(&self, asset: &str) -> GatewayResult<Option<Balance>> {
        let query = self.signed_query("")?;
        let url = format!("{}/api/v3/account?{}", self.base_url, query);

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.credentials()?.api_key)
            .send()
            .await?;

        let account: AccountResponse = Self::decode(response).await?;
        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
            .map(|b| Balance {
                free: b.free,
                locked: b.locked,
            }))
    }
}

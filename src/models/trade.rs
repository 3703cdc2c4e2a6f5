//! Trade records and the bounded in-memory trade ledger.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed (acknowledged) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub symbol: String,
    pub price: Decimal,
    pub amount: Decimal,

    /// Realized P&L, present only on closing records
    #[serde(default)]
    pub pnl: Option<Decimal>,
}

impl TradeRecord {
    pub fn opening(symbol: &str, price: Decimal, amount: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            side: TradeSide::Buy,
            symbol: symbol.to_string(),
            price,
            amount,
            pnl: None,
        }
    }

    pub fn closing(
        symbol: &str,
        price: Decimal,
        amount: Decimal,
        pnl: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: at,
            side: TradeSide::Sell,
            symbol: symbol.to_string(),
            price,
            amount,
            pnl: Some(pnl),
        }
    }
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} {} @ {:.4} | Amt: {:.4}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.side,
            self.symbol,
            self.price,
            self.amount
        )?;
        if let Some(pnl) = self.pnl {
            write!(f, " | PnL: ${:.4}", pnl)?;
        }
        Ok(())
    }
}

/// Append-only trade history with a fixed capacity.
///
/// Once full, appending evicts the oldest record.
#[derive(Debug, Clone)]
pub struct TradeLedger {
    records: VecDeque<TradeRecord>,
    capacity: usize,
}

impl TradeLedger {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, record: TradeRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The most recent `n` records, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &TradeRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for TradeLedger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

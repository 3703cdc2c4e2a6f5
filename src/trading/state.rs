//! The agent's single mutable state object.
//!
//! Runtime configuration, risk bookkeeping, the open position and the trade
//! ledger live together behind one lock so command application and trade
//! evaluation never interleave.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{Position, TradeLedger, TradeRecord};

use super::risk::GovernorOutcome;
use super::{RiskState, RuntimeConfig};

/// State shared between the trading loop and anything reporting on it.
pub type SharedState = Arc<Mutex<BotState>>;

/// Rejected position transition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("a position is already open")]
    AlreadyOpen,

    #[error("no position is open")]
    NotOpen,
}

/// Result of closing the position.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub price: Decimal,
    pub amount: Decimal,
    pub pnl: Decimal,
    pub governor: GovernorOutcome,
}

#[derive(Debug, Clone)]
pub struct BotState {
    pub config: RuntimeConfig,
    pub risk: RiskState,
    pub position: Option<Position>,
    pub ledger: TradeLedger,
}

impl BotState {
    pub fn new(config: RuntimeConfig, ledger_capacity: usize) -> Self {
        Self {
            config,
            risk: RiskState::default(),
            position: None,
            ledger: TradeLedger::new(ledger_capacity),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    /// FLAT -> OPEN after an acknowledged buy.
    pub fn open_position(
        &mut self,
        price: Decimal,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<&Position, TransitionError> {
        if self.position.is_some() {
            return Err(TransitionError::AlreadyOpen);
        }

        self.ledger
            .push(TradeRecord::opening(&self.config.symbol, price, amount, at));
        self.config.force_buy = false;

        let position: &Position = self.position.insert(Position::new(price, amount, at));
        Ok(position)
    }

    /// OPEN -> FLAT after an acknowledged sell.
    pub fn close_position(
        &mut self,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<ClosedTrade, TransitionError> {
        let position = self.position.take().ok_or(TransitionError::NotOpen)?;
        let pnl = position.pnl_at(price);

        self.ledger.push(TradeRecord::closing(
            &self.config.symbol,
            price,
            position.amount,
            pnl,
            at,
        ));
        let governor = self.risk.record_close(pnl, at, &mut self.config);
        self.config.force_sell = false;

        Ok(ClosedTrade {
            price,
            amount: position.amount,
            pnl,
            governor,
        })
    }

    /// Switch instruments: the old position and ledger no longer apply.
    pub fn switch_symbol(&mut self, symbol: String) {
        self.config.symbol = symbol;
        self.position = None;
        self.ledger.clear();
    }

    /// Lift an expired cooldown, see [`RiskState::resume_if_due`].
    pub fn resume_if_due(&mut self, now: DateTime<Utc>) -> bool {
        self.risk.resume_if_due(now, &mut self.config)
    }
}

impl Default for BotState {
    fn default() -> Self {
        Self::new(RuntimeConfig::default(), TradeLedger::DEFAULT_CAPACITY)
    }
}

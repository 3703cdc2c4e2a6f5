//! Entry/exit rules of the FLAT/OPEN position state machine.
//!
//! Evaluation is pure: it inspects the state and the tick's signals and
//! returns what should be done. State only changes once the order gateway
//! has acknowledged the resulting order (see [`super::BotState`]).

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::indicators::Signals;

use super::{BotState, RuntimeConfig};

/// Why a position is being opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryReason {
    ForceBuy,
    Signal,
}

/// Why a position is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ForceSell,
    TakeProfit,
    StopLoss,
    RsiExit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::ForceSell => "force sell",
            ExitReason::TakeProfit => "take profit",
            ExitReason::StopLoss => "stop loss",
            ExitReason::RsiExit => "RSI exit",
        };
        f.write_str(s)
    }
}

/// Decision for the current tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeAction {
    Hold,
    Enter {
        quantity: Decimal,
        reason: EntryReason,
    },
    Exit {
        amount: Decimal,
        pnl: Decimal,
        reason: ExitReason,
    },
}

/// Evaluate the state machine for one tick at `price`.
pub fn evaluate(state: &BotState, price: Decimal, signals: &Signals) -> TradeAction {
    match &state.position {
        None => check_entry(&state.config, price, signals),
        Some(position) => {
            let pnl = position.pnl_at(price);
            match check_exit(&state.config, pnl, signals) {
                Some(reason) => TradeAction::Exit {
                    amount: position.amount,
                    pnl,
                    reason,
                },
                None => TradeAction::Hold,
            }
        }
    }
}

fn check_entry(config: &RuntimeConfig, price: Decimal, signals: &Signals) -> TradeAction {
    if !config.active || price <= Decimal::ZERO {
        return TradeAction::Hold;
    }

    let reason = if config.force_buy {
        EntryReason::ForceBuy
    } else {
        let in_band = (config.rsi_entry_min..=config.rsi_entry_max).contains(&signals.rsi);
        let above_sar = price.to_f64().is_some_and(|p| p > signals.sar);
        if !(in_band && above_sar) {
            return TradeAction::Hold;
        }
        EntryReason::Signal
    };

    match config.capital.checked_div(price) {
        Some(quantity) if quantity > Decimal::ZERO => TradeAction::Enter { quantity, reason },
        _ => {
            debug!(capital = %config.capital, price = %price, "Entry size not representable");
            TradeAction::Hold
        }
    }
}

/// First matching exit condition, in priority order.
pub fn check_exit(config: &RuntimeConfig, pnl: Decimal, signals: &Signals) -> Option<ExitReason> {
    if config.force_sell {
        Some(ExitReason::ForceSell)
    } else if pnl >= config.profit_target() {
        Some(ExitReason::TakeProfit)
    } else if pnl <= config.stop_loss_target() {
        Some(ExitReason::StopLoss)
    } else if signals.rsi <= config.rsi_exit {
        Some(ExitReason::RsiExit)
    } else {
        None
    }
}

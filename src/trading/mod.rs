//! Trading logic: runtime configuration, position state machine, loss governor.

mod config;
mod risk;
mod state;
mod strategy;

pub use config::RuntimeConfig;
pub use risk::{GovernorOutcome, RiskState};
pub use state::{BotState, ClosedTrade, SharedState, TransitionError};
pub use strategy::{check_exit, evaluate, EntryReason, ExitReason, TradeAction};

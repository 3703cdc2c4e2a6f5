//! Runtime trading configuration.
//!
//! Read by the trading loop on every tick and mutated only by remote
//! commands (plus the loss governor toggling `active`).

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Mutable parameters of the running agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Traded pair, e.g. "XRPUSDT"
    pub symbol: String,

    /// Quote currency committed per entry
    pub capital: Decimal,

    // === Entry / Exit ===
    /// Lower bound of the RSI entry band (inclusive)
    pub rsi_entry_min: f64,

    /// Upper bound of the RSI entry band (inclusive)
    pub rsi_entry_max: f64,

    /// Exit when RSI drops to or below this level
    pub rsi_exit: f64,

    /// Take profit as a fraction of capital (0.01 = 1%)
    pub profit_target_pct: Decimal,

    /// Stop loss as a fraction of capital, negative (-0.0009 = -0.09%)
    pub stop_loss_pct: Decimal,

    // === Loss Governor ===
    /// Consecutive non-profitable closes before pausing
    pub max_loss_count: u32,

    /// How long to pause once the loss streak limit is hit
    #[serde(with = "duration_secs")]
    pub cooldown: Duration,

    // === Switches ===
    /// New entries are only taken while active
    pub active: bool,

    /// Enter on the next tick regardless of signals
    pub force_buy: bool,

    /// Exit on the next tick regardless of signals
    pub force_sell: bool,
}

impl RuntimeConfig {
    /// Absolute take-profit level in quote currency.
    pub fn profit_target(&self) -> Decimal {
        self.capital * self.profit_target_pct
    }

    /// Absolute stop-loss level in quote currency (negative).
    pub fn stop_loss_target(&self) -> Decimal {
        self.capital * self.stop_loss_pct
    }

    /// Cooldown in whole minutes, for display.
    pub fn cooldown_minutes(&self) -> i64 {
        self.cooldown.num_minutes()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbol: "XRPUSDT".to_string(),
            capital: dec!(2),
            rsi_entry_min: 47.0,
            rsi_entry_max: 52.0,
            rsi_exit: 43.0,
            profit_target_pct: dec!(0.01),   // 1%
            stop_loss_pct: dec!(-0.0009),    // -0.09%
            max_loss_count: 3,
            cooldown: Duration::minutes(10),
            active: true,
            force_buy: false,
            force_sell: false,
        }
    }
}

mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        i64::deserialize(d).map(Duration::seconds)
    }
}

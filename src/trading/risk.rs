//! Loss-streak governor and cumulative P&L accounting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::RuntimeConfig;

/// Risk bookkeeping carried across trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Consecutive closes with pnl <= 0
    pub loss_streak: u32,

    /// When a governor-imposed pause ends
    pub cooldown_deadline: Option<DateTime<Utc>>,

    /// Sum of positive realized pnl
    pub total_profit: Decimal,

    /// Sum of non-positive realized pnl (<= 0)
    pub total_loss: Decimal,

    /// Number of closed round trips
    pub total_trades: u32,
}

/// What the governor did in response to a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorOutcome {
    /// Profitable close; streak reset
    StreakReset,
    /// Losing close; streak now at the given value
    LossRecorded(u32),
    /// Losing close that hit the limit; trading paused until the deadline
    Paused { until: DateTime<Utc> },
}

impl RiskState {
    /// Net realized P&L.
    pub fn net_pnl(&self) -> Decimal {
        self.total_profit + self.total_loss
    }

    /// Account for a closed position at `closed_at`.
    pub fn record_close(
        &mut self,
        pnl: Decimal,
        closed_at: DateTime<Utc>,
        config: &mut RuntimeConfig,
    ) -> GovernorOutcome {
        self.total_trades += 1;

        if pnl > Decimal::ZERO {
            self.total_profit += pnl;
            self.loss_streak = 0;
            return GovernorOutcome::StreakReset;
        }

        self.total_loss += pnl;
        self.loss_streak += 1;

        if self.loss_streak >= config.max_loss_count {
            let until = closed_at + config.cooldown;
            config.active = false;
            self.cooldown_deadline = Some(until);
            warn!(
                loss_streak = self.loss_streak,
                until = %until,
                "Loss streak limit reached, pausing"
            );
            return GovernorOutcome::Paused { until };
        }

        GovernorOutcome::LossRecorded(self.loss_streak)
    }

    /// Lift an expired cooldown. Returns true if trading was resumed.
    pub fn resume_if_due(&mut self, now: DateTime<Utc>, config: &mut RuntimeConfig) -> bool {
        match self.cooldown_deadline {
            Some(deadline) if !config.active && now >= deadline => {
                config.active = true;
                self.loss_streak = 0;
                self.cooldown_deadline = None;
                info!(deadline = %deadline, "Cooldown elapsed, trading resumed");
                true
            }
            _ => false,
        }
    }

    /// Manual reset: clears the streak and any pending cooldown.
    pub fn reset(&mut self, config: &mut RuntimeConfig) {
        self.loss_streak = 0;
        self.cooldown_deadline = None;
        config.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_three_losses_pause_until_exact_deadline() {
        let mut config = RuntimeConfig::default();
        let mut risk = RiskState::default();

        assert_eq!(
            risk.record_close(dec!(-0.01), t(0), &mut config),
            GovernorOutcome::LossRecorded(1)
        );
        assert_eq!(
            risk.record_close(Decimal::ZERO, t(60), &mut config),
            GovernorOutcome::LossRecorded(2)
        );
        assert!(config.active);

        let outcome = risk.record_close(dec!(-0.02), t(120), &mut config);
        let expected = t(120) + Duration::seconds(600);
        assert_eq!(outcome, GovernorOutcome::Paused { until: expected });
        assert!(!config.active);
        assert_eq!(risk.cooldown_deadline, Some(expected));
        assert_eq!(risk.loss_streak, 3);
        assert_eq!(risk.total_trades, 3);
        assert_eq!(risk.total_loss, dec!(-0.03));
    }

    #[test]
    fn test_profit_resets_streak() {
        let mut config = RuntimeConfig::default();
        let mut risk = RiskState::default();

        risk.record_close(dec!(-0.01), t(0), &mut config);
        risk.record_close(dec!(-0.01), t(1), &mut config);
        assert_eq!(
            risk.record_close(dec!(0.05), t(2), &mut config),
            GovernorOutcome::StreakReset
        );
        assert_eq!(risk.loss_streak, 0);
        assert_eq!(risk.total_profit, dec!(0.05));
        assert_eq!(risk.net_pnl(), dec!(0.03));

        // Two more losses do not reach the limit of three.
        risk.record_close(dec!(-0.01), t(3), &mut config);
        risk.record_close(dec!(-0.01), t(4), &mut config);
        assert!(config.active);
    }

    #[test]
    fn test_resume_only_after_deadline() {
        let mut config = RuntimeConfig::default();
        let mut risk = RiskState::default();
        for i in 0..3 {
            risk.record_close(dec!(-1), t(i), &mut config);
        }
        let deadline = risk.cooldown_deadline.unwrap();

        assert!(!risk.resume_if_due(deadline - Duration::seconds(1), &mut config));
        assert!(!config.active);

        assert!(risk.resume_if_due(deadline, &mut config));
        assert!(config.active);
        assert_eq!(risk.loss_streak, 0);
        assert_eq!(risk.cooldown_deadline, None);

        // Nothing left to resume.
        assert!(!risk.resume_if_due(deadline + Duration::hours(1), &mut config));
    }

    #[test]
    fn test_manual_stop_is_not_auto_resumed() {
        let mut config = RuntimeConfig {
            active: false,
            ..Default::default()
        };
        let mut risk = RiskState::default();
        assert!(!risk.resume_if_due(t(10_000), &mut config));
        assert!(!config.active);
    }

    #[test]
    fn test_manual_reset() {
        let mut config = RuntimeConfig::default();
        let mut risk = RiskState::default();
        for i in 0..3 {
            risk.record_close(dec!(-1), t(i), &mut config);
        }
        risk.reset(&mut config);
        assert!(config.active);
        assert_eq!(risk.loss_streak, 0);
        assert_eq!(risk.cooldown_deadline, None);
        assert_eq!(risk.total_trades, 3);
    }
}

//! Independent periodic timers driven by the main tick.

use std::time::Duration;

use tokio::time::Instant;

/// Fires at most once per `period`, measured from the last firing.
#[derive(Debug, Clone)]
pub struct Cadence {
    period: Duration,
    last: Option<Instant>,
}

impl Cadence {
    /// A cadence that is due on its first check.
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        }
    }

    /// Returns true and restarts the period if due.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    /// Make the next check due regardless of elapsed time.
    pub fn force(&mut self) {
        self.last = None;
    }
}

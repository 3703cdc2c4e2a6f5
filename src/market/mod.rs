//! Market data cache: the confirmed candle window plus the latest tick.
//!
//! The confirmed window only ever changes through [`CandleCache::replace`];
//! live ticks are kept alongside it and folded in when a snapshot is taken,
//! so indicators always see an immutable, time-ordered sequence.

use tracing::debug;

use crate::models::Candle;

/// Default number of candles held (and requested on refresh).
pub const DEFAULT_CANDLE_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct CandleCache {
    symbol: String,
    capacity: usize,
    confirmed: Vec<Candle>,
    latest_tick: Option<f64>,
}

impl CandleCache {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            capacity: capacity.max(1),
            confirmed: Vec::new(),
            latest_tick: None,
        }
    }

    /// Symbol the cached window belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Drop everything and start tracking a different instrument.
    pub fn reset(&mut self, symbol: impl Into<String>) {
        self.symbol = symbol.into();
        self.confirmed.clear();
        self.latest_tick = None;
    }

    /// True when no confirmed window is available for the current symbol.
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    /// Replace the confirmed window with a freshly fetched one.
    ///
    /// Candles are ordered by open time, non-increasing duplicates are
    /// dropped and only the newest `capacity` are kept. An empty fetch leaves
    /// the current window in place. Returns whether the window was replaced.
    pub fn replace(&mut self, mut candles: Vec<Candle>) -> bool {
        if candles.is_empty() {
            return false;
        }

        candles.sort_by(|a, b| a.open_time.cmp(&b.open_time));
        candles.dedup_by(|later, earlier| later.open_time <= earlier.open_time);

        if candles.len() > self.capacity {
            let excess = candles.len() - self.capacity;
            candles.drain(..excess);
        }

        debug!(symbol = %self.symbol, candles = candles.len(), "Candle window refreshed");

        self.confirmed = candles;
        self.latest_tick = None;
        true
    }

    /// Record a live price for the current (last) candle.
    pub fn merge_tick(&mut self, price: f64) {
        if price.is_finite() {
            self.latest_tick = Some(price);
        }
    }

    #[cfg(test)]
    pub fn latest_tick(&self) -> Option<f64> {
        self.latest_tick
    }

    /// The confirmed window exactly as last fetched.
    #[cfg(test)]
    pub fn confirmed(&self) -> &[Candle] {
        &self.confirmed
    }

    /// Snapshot for indicator computation: the confirmed window with the
    /// last candle's close replaced by the latest tick, if any.
    pub fn window(&self) -> Vec<Candle> {
        let mut window = self.confirmed.clone();
        if let (Some(price), Some(last)) = (self.latest_tick, window.last_mut()) {
            *last = last.with_close(price);
        }
        window
    }
}

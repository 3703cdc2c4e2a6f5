//! Candle model: one fixed-interval OHLCV aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single kline as returned by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Start of the candle interval
    pub open_time: DateTime<Utc>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,

    /// Base asset volume traded during the interval
    pub volume: f64,

    /// End of the candle interval
    pub close_time: DateTime<Utc>,
}

impl Candle {
    /// Copy of this candle with its close replaced by a live tick price.
    pub fn with_close(&self, price: f64) -> Self {
        Self {
            close: price,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_with_close_leaves_original() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let candle = Candle {
            open_time: t,
            open: 1.0,
            high: 1.2,
            low: 0.9,
            close: 1.1,
            volume: 10.0,
            close_time: t,
        };

        let merged = candle.with_close(1.15);
        assert_eq!(merged.close, 1.15);
        assert_eq!(merged.high, 1.2);
        assert_eq!(merged.low, 0.9);
        assert_eq!(candle.close, 1.1);
    }
}

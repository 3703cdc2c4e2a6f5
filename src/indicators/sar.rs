//! Parabolic SAR (stop-and-reverse) trend indicator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Candle;

const AF_START: f64 = 0.02;
const AF_STEP: f64 = 0.02;
const AF_MAX: f64 = 0.2;

/// Trend implied by the latest close relative to the SAR level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Uptrend,
    Downtrend,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Uptrend => f.write_str("Uptrend"),
            Trend::Downtrend => f.write_str("Downtrend"),
        }
    }
}

/// Latest SAR level and the trend it implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SarReading {
    pub sar: f64,
    pub trend: Trend,
}

/// Compute the Parabolic SAR over the window and return the latest reading.
///
/// With fewer than two candles the last low (or 0.0 for an empty window) is
/// returned together with [`Trend::Downtrend`].
pub fn compute_parabolic_sar(candles: &[Candle]) -> SarReading {
    if candles.len() < 2 {
        return SarReading {
            sar: candles.last().map(|c| c.low).unwrap_or(0.0),
            trend: Trend::Downtrend,
        };
    }

    let mut rising = candles[1].high > candles[0].high;
    let mut ep = if rising { candles[0].high } else { candles[0].low };
    let mut af = AF_START;
    let mut sar = candles[0].low;

    for i in 1..candles.len() {
        let cur = &candles[i];
        let prior = &candles[i.saturating_sub(2)..i];
        let candidate = sar + af * (ep - sar);

        if rising {
            let bound = prior.iter().map(|c| c.low).fold(candidate, f64::min);
            if cur.low < bound {
                rising = false;
                sar = ep;
                ep = cur.low;
                af = AF_START;
                continue;
            }
            if cur.high > ep {
                ep = cur.high;
                af = (af + AF_STEP).min(AF_MAX);
            }
            sar = bound;
        } else {
            let bound = prior.iter().map(|c| c.high).fold(candidate, f64::max);
            if cur.high > bound {
                rising = true;
                sar = ep;
                ep = cur.high;
                af = AF_START;
                continue;
            }
            if cur.low < ep {
                ep = cur.low;
                af = (af + AF_STEP).min(AF_MAX);
            }
            sar = bound;
        }
    }

    let last_close = candles[candles.len() - 1].close;
    let trend = if last_close > sar {
        Trend::Uptrend
    } else {
        Trend::Downtrend
    };

    SarReading { sar, trend }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::candle;

    #[test]
    fn test_short_window_sentinel() {
        let one = vec![candle(0, 10.0, 12.0, 9.0, 11.0)];
        let reading = compute_parabolic_sar(&one);
        assert_eq!(reading.sar, 9.0);
        assert_eq!(reading.trend, Trend::Downtrend);

        let empty = compute_parabolic_sar(&[]);
        assert_eq!(empty.sar, 0.0);
        assert_eq!(empty.trend, Trend::Downtrend);
    }

    #[test]
    fn test_monotonic_uptrend() {
        let candles: Vec<Candle> = (0..50)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(i, base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect();

        let reading = compute_parabolic_sar(&candles);
        let last = candles.last().unwrap();
        assert_eq!(reading.trend, Trend::Uptrend);
        assert!(reading.sar < last.close);
        assert!(reading.sar <= last.low);
    }

    #[test]
    fn test_reversal_to_downtrend() {
        let mut candles: Vec<Candle> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(i, base, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        // Sharp sell-off well below any trailing stop.
        for j in 0..10 {
            let base = 90.0 - 3.0 * j as f64;
            candles.push(candle(20 + j, base, base + 0.5, base - 2.0, base - 1.5));
        }

        let reading = compute_parabolic_sar(&candles);
        let last = candles.last().unwrap();
        assert_eq!(reading.trend, Trend::Downtrend);
        assert!(reading.sar > last.close);
    }

    #[test]
    fn test_flip_sets_sar_to_prior_extreme() {
        // Up, then the third candle breaks below the trailing level.
        let candles = vec![
            candle(0, 10.0, 11.0, 9.0, 10.5),
            candle(1, 10.5, 12.0, 10.0, 11.5),
            candle(2, 11.0, 11.2, 5.0, 5.5),
        ];
        let reading = compute_parabolic_sar(&candles);
        // EP before the flip was the highest high seen (12.0).
        assert_eq!(reading.sar, 12.0);
        assert_eq!(reading.trend, Trend::Downtrend);
    }

    #[test]
    fn test_trend_display() {
        assert_eq!(Trend::Uptrend.to_string(), "Uptrend");
        assert_eq!(Trend::Downtrend.to_string(), "Downtrend");
    }
}

//! Relative Strength Index with Wilder smoothing.

use crate::models::Candle;

/// Value returned when the window holds too few closes to seed the averages.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Default lookback used by the trading loop.
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Compute the RSI of the candle closes.
///
/// Averages are seeded with the simple mean of the first `period` deltas and
/// then Wilder-smoothed over the remaining deltas. Returns [`RSI_NEUTRAL`]
/// when fewer than `period + 1` closes are available, and saturates at 100.0
/// as soon as the average loss is zero.
pub fn compute_rsi(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() <= period {
        return RSI_NEUTRAL;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let delta = w[1].close - w[0].close;
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();

    let p = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / p;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / p;

    if avg_loss == 0.0 {
        return 100.0;
    }
    let mut rsi = rsi_from(avg_gain, avg_loss);

    for (gain, loss) in gains.iter().zip(&losses).skip(period) {
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        if avg_loss == 0.0 {
            return 100.0;
        }
        rsi = rsi_from(avg_gain, avg_loss);
    }

    rsi
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

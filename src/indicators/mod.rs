//! Technical indicators computed over a candle window.
//!
//! Everything here is a pure function of its input slice.

mod rsi;
mod sar;

pub use rsi::{compute_rsi, DEFAULT_RSI_PERIOD, RSI_NEUTRAL};
pub use sar::{compute_parabolic_sar, SarReading, Trend};

use crate::models::Candle;

/// Indicator values for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    pub rsi: f64,
    pub sar: f64,
    pub trend: Trend,
}

impl Signals {
    pub fn compute(candles: &[Candle], rsi_period: usize) -> Self {
        let SarReading { sar, trend } = compute_parabolic_sar(candles);
        Self {
            rsi: compute_rsi(candles, rsi_period),
            sar,
            trend,
        }
    }
}

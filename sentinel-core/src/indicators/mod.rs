//! Indicator trait and concrete indicators.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! Warmup positions are `f64::NAN`; the snapshot builder turns a NaN latest
//! value into an absent field, never a guessed one.

pub mod atr;
pub mod ema;
pub mod order_flow;
pub mod rate_of_change;
pub mod rsi;
pub mod volume_ratio;

pub use atr::Atr;
pub use ema::Ema;
pub use order_flow::{OrderFlow, OrderFlowConfig, WhaleSide};
pub use rate_of_change::RateOfChange;
pub use rsi::Rsi;
pub use volume_ratio::VolumeRatio;

use crate::domain::Candle;

/// Trait for candle-series indicators.
///
/// `compute` returns a series of the same length as the input. The first
/// `lookback()` values are `f64::NAN`.
///
/// # Look-ahead contamination guard
/// No value at candle t may depend on candle t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles before the first valid output.
    fn lookback(&self) -> usize;

    fn compute(&self, candles: &[Candle]) -> Vec<f64>;

    /// Candles needed for one valid value.
    fn min_candles(&self) -> usize {
        self.lookback() + 1
    }

    /// Value at the latest candle, absent during warmup or on non-finite output.
    fn latest(&self, candles: &[Candle]) -> Option<f64> {
        if candles.len() < self.min_candles() {
            return None;
        }
        self.compute(candles).last().copied().filter(|v| v.is_finite())
    }
}

/// Create synthetic hourly candles from close prices for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + chrono::TimeDelta::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

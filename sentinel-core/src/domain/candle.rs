//! Candle: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed OHLCV candle. Immutable once closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }

    /// Candle span as a percentage of the close.
    pub fn volatility_pct(&self) -> f64 {
        (self.high - self.low) / self.close * 100.0
    }

    /// Where the close sits inside the candle, 0 at the low and 1 at the high.
    /// A zero-range candle is defined as 0.5.
    pub fn range_position(&self) -> f64 {
        let range = self.high - self.low;
        if range <= f64::EPSILON * self.high.abs().max(1.0) {
            return 0.5;
        }
        ((self.close - self.low) / range).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_candle() -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample_candle().is_sane());
    }

    #[test]
    fn candle_detects_void() {
        let mut candle = sample_candle();
        candle.open = f64::NAN;
        assert!(candle.is_void());
        assert!(!candle.is_sane());
    }

    #[test]
    fn candle_detects_insane_high_low() {
        let mut candle = sample_candle();
        candle.high = 97.0; // below low
        assert!(!candle.is_sane());
    }

    #[test]
    fn range_position_of_flat_candle_is_half() {
        let mut candle = sample_candle();
        candle.open = 100.0;
        candle.high = 100.0;
        candle.low = 100.0;
        candle.close = 100.0;
        assert_eq!(candle.range_position(), 0.5);
    }

    #[test]
    fn range_position_and_volatility() {
        let candle = sample_candle();
        // (103 - 98) / (105 - 98)
        assert!((candle.range_position() - 5.0 / 7.0).abs() < 1e-12);
        // (105 - 98) / 103 * 100
        assert!((candle.volatility_pct() - 700.0 / 103.0).abs() < 1e-12);
    }
}

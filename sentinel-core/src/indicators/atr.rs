//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR is the rolling simple mean of the last `period` true ranges.
//! TR[0] has no previous close and is excluded, so the first value lands at
//! index `period`.

use crate::domain::Candle;

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series. TR[0] = high[0] - low[0].
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(candles.len());
    for (i, c) in candles.iter().enumerate() {
        if i == 0 {
            tr.push(c.high - c.low);
            continue;
        }
        let pc = candles[i - 1].close;
        tr.push((c.high - c.low).max((c.high - pc).abs()).max((c.low - pc).abs()));
    }
    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let tr = true_range(candles);
        let mut sum: f64 = tr[1..=self.period].iter().sum();
        result[self.period] = sum / self.period as f64;

        for i in (self.period + 1)..n {
            sum += tr[i] - tr[i - self.period];
            if sum.is_nan() {
                // Recompute so one NaN does not poison the rest of the series.
                sum = tr[(i + 1 - self.period)..=i].iter().sum();
            }
            let atr = sum / self.period as f64;
            // Rolling float drift can dip below zero on flat series.
            result[i] = if atr < 0.0 { 0.0 } else { atr };
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::TimeZone;

    fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                timestamp: base + chrono::TimeDelta::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn true_range_basic() {
        let candles = make_ohlc_candles(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10
            (102.0, 108.0, 100.0, 106.0), // TR = max(8, 6, 2) = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = max(9, 1, 8) = 9
        ]);
        let tr = true_range(&candles);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let candles = make_ohlc_candles(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, 15, 8) = 15
        ]);
        assert_approx(true_range(&candles)[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_is_rolling_mean() {
        let candles = make_ohlc_candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0), // 8
            (106.0, 107.0, 98.0, 99.0),   // 9
            (99.0, 103.0, 97.0, 101.0),   // max(6, 4, 2) = 6
        ]);
        let atr = Atr::new(2).compute(&candles);
        assert!(atr[0].is_nan());
        assert!(atr[1].is_nan());
        assert_approx(atr[2], 8.5, DEFAULT_EPSILON);
        assert_approx(atr[3], 7.5, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_of_flat_series_is_zero() {
        let candles = make_ohlc_candles(&[(100.0, 100.0, 100.0, 100.0); 6]);
        let atr = Atr::new(3).compute(&candles);
        assert_approx(atr[5], 0.0, DEFAULT_EPSILON);
    }
}

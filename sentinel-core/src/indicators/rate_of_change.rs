//! Rate of change: percentage close change over N candles.
//!
//! ROC[t] = (close[t] - close[t-n]) / close[t-n] * 100
//! With n = 1 this is the short-term change the scorer filters on.

use crate::domain::Candle;

use super::Indicator;

#[derive(Debug, Clone)]
pub struct RateOfChange {
    bars: usize,
    name: String,
}

impl RateOfChange {
    pub fn new(bars: usize) -> Self {
        assert!(bars >= 1, "ROC bars must be >= 1");
        Self {
            bars,
            name: format!("roc_{bars}"),
        }
    }
}

impl Indicator for RateOfChange {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.bars
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];

        for i in self.bars..n {
            let prev = candles[i - self.bars].close;
            let curr = candles[i].close;
            if prev.is_finite() && curr.is_finite() && prev != 0.0 {
                result[i] = (curr - prev) / prev * 100.0;
            }
        }

        result
    }
}

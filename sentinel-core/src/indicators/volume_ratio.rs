//! Volume ratio: latest volume over its rolling mean.
//!
//! The mean window includes the current candle.
//! Lookback: window - 1.

use crate::domain::Candle;

use super::Indicator;

#[derive(Debug, Clone)]
pub struct VolumeRatio {
    window: usize,
    name: String,
}

impl VolumeRatio {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "volume window must be >= 1");
        Self {
            window,
            name: format!("volume_ratio_{window}"),
        }
    }
}

impl Indicator for VolumeRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        if n < self.window {
            return result;
        }

        for i in (self.window - 1)..n {
            let window = &candles[(i + 1 - self.window)..=i];
            let mean = window.iter().map(|c| c.volume).sum::<f64>() / self.window as f64;
            // Zero mean volume carries no information, leave the value absent.
            if mean > 0.0 && mean.is_finite() {
                result[i] = candles[i].volume / mean;
            }
        }

        result
    }
}

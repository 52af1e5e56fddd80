//! Directional signal emitted by the scorer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;

/// Trade direction. `Hold` is the absence of a directional view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
    Hold,
}

impl Direction {
    /// +1 for long, -1 for short, 0 for hold.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Hold => 0.0,
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Direction::Hold)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::Hold => "HOLD",
        })
    }
}

/// A fully formed directional signal with its protective levels.
///
/// Signals are value objects: downstream consumers (risk sizing, council,
/// simulator) read them and never mutate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub direction: Direction,
    /// Heuristic weight in [0, 90]. Not a probability.
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reasoning: Vec<String>,
    pub source_analyst: String,
    /// Close time of the candle the signal was generated on.
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// LONG: stop < entry < target. SHORT: target < entry < stop.
    pub fn levels_ordered(&self) -> bool {
        match self.direction {
            Direction::Long => {
                self.stop_loss < self.entry_price && self.entry_price < self.take_profit
            }
            Direction::Short => {
                self.take_profit < self.entry_price && self.entry_price < self.stop_loss
            }
            Direction::Hold => false,
        }
    }

    /// Distance from entry to stop.
    pub fn risk_per_unit(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    /// Reward-to-risk ratio of the protective levels.
    pub fn risk_reward(&self) -> Option<f64> {
        let risk = self.risk_per_unit();
        if risk <= 0.0 || !risk.is_finite() {
            return None;
        }
        Some((self.take_profit - self.entry_price).abs() / risk)
    }
}

//! Same-candle ambiguity: a candle whose range covers both stop and target.
//!
//! OHLC data cannot reveal which level traded first, so the resolution is a
//! policy. `StopFirst` is the pessimistic default.

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Assume the stop traded first.
    #[default]
    StopFirst,
    /// Assume the target traded first.
    TargetFirst,
    /// Infer the intrabar path from the open: if |open - high| <= |open - low|
    /// the path is Open → High → Low → Close, otherwise Open → Low → High → Close.
    OhlcPath,
}

impl AmbiguityPolicy {
    /// Whether the stop is taken when both levels sit inside `candle`.
    pub fn stop_wins(&self, direction: Direction, candle: &Candle) -> bool {
        match self {
            AmbiguityPolicy::StopFirst => true,
            AmbiguityPolicy::TargetFirst => false,
            AmbiguityPolicy::OhlcPath => {
                let to_high = (candle.open - candle.high).abs();
                let to_low = (candle.open - candle.low).abs();
                let high_first = to_high <= to_low;
                // A long's stop sits below, a short's above.
                match direction {
                    Direction::Short => high_first,
                    _ => !high_first,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(open: f64, high: f64, low: f64) -> Candle {
        Candle {
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close: open,
            volume: 1.0,
        }
    }

    #[test]
    fn fixed_policies() {
        let c = candle(100.0, 105.0, 97.0);
        assert!(AmbiguityPolicy::StopFirst.stop_wins(Direction::Long, &c));
        assert!(!AmbiguityPolicy::TargetFirst.stop_wins(Direction::Long, &c));
    }

    #[test]
    fn ohlc_path_follows_open_proximity() {
        // Open near the high: high first, a long's target trades first.
        let near_high = candle(104.0, 105.0, 97.0);
        assert!(!AmbiguityPolicy::OhlcPath.stop_wins(Direction::Long, &near_high));
        assert!(AmbiguityPolicy::OhlcPath.stop_wins(Direction::Short, &near_high));

        let near_low = candle(98.0, 105.0, 97.0);
        assert!(AmbiguityPolicy::OhlcPath.stop_wins(Direction::Long, &near_low));
        assert!(!AmbiguityPolicy::OhlcPath.stop_wins(Direction::Short, &near_low));
    }

    #[test]
    fn default_is_stop_first() {
        assert_eq!(AmbiguityPolicy::default(), AmbiguityPolicy::StopFirst);
    }
}

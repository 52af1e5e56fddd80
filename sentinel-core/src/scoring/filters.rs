//! The ordered hard-filter chain of the signal scorer.
//!
//! Each step records a `FilterCheck` with the values it looked at, so every
//! HOLD can be explained by name.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::regime::RegimeAssessment;
use crate::snapshot::IndicatorBundle;

use super::TimeframeConfig;

/// Range position below which a LONG candidate is pressed toward the low.
pub const LONG_RANGE_CEILING: f64 = 0.3;
/// Range position above which a SHORT candidate is pressed toward the high.
pub const SHORT_RANGE_FLOOR: f64 = 0.7;
/// Counter-trend strength tolerated, as a multiple of `trend_filter_strength`.
pub const TREND_REJECT_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStep {
    Volatility,
    PriceAction,
    Rsi,
    Trend,
    Volume,
    RegimeGate,
    Risk,
}

impl FilterStep {
    /// Hard filters in evaluation order.
    pub const CHAIN: [FilterStep; 6] = [
        FilterStep::Volatility,
        FilterStep::PriceAction,
        FilterStep::Rsi,
        FilterStep::Trend,
        FilterStep::Volume,
        FilterStep::RegimeGate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterStep::Volatility => "volatility",
            FilterStep::PriceAction => "price_action",
            FilterStep::Rsi => "rsi",
            FilterStep::Trend => "trend",
            FilterStep::Volume => "volume",
            FilterStep::RegimeGate => "regime_gate",
            FilterStep::Risk => "risk",
        }
    }
}

impl fmt::Display for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one filter step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCheck {
    pub step: FilterStep,
    pub passed: bool,
    pub detail: String,
    pub state: BTreeMap<String, f64>,
}

impl FilterCheck {
    fn new(step: FilterStep, passed: bool, detail: String) -> Self {
        Self {
            step,
            passed,
            detail,
            state: BTreeMap::new(),
        }
    }

    fn unavailable(step: FilterStep, field: &str) -> Self {
        Self::new(step, false, format!("{field} unavailable"))
    }

    fn with(mut self, key: &str, value: f64) -> Self {
        self.state.insert(key.to_string(), value);
        self
    }
}

/// Evaluate one step for a candidate direction.
pub fn evaluate(
    step: FilterStep,
    direction: Direction,
    bundle: &IndicatorBundle,
    regime: &RegimeAssessment,
    config: &TimeframeConfig,
) -> FilterCheck {
    let long = direction == Direction::Long;
    match step {
        FilterStep::Volatility => {
            let v = bundle.volatility_pct;
            let passed = v <= config.max_volatility_pct;
            FilterCheck::new(
                step,
                passed,
                format!("volatility {v:.2}% vs max {:.2}%", config.max_volatility_pct),
            )
            .with("volatility_pct", v)
        }
        FilterStep::PriceAction => {
            let Some(change) = bundle.change_pct else {
                return FilterCheck::unavailable(step, "change_pct");
            };
            let pos = bundle.range_position;
            let passed = if long {
                change <= -config.min_change_pct && pos < LONG_RANGE_CEILING
            } else {
                change >= config.min_change_pct && pos > SHORT_RANGE_FLOOR
            };
            FilterCheck::new(
                step,
                passed,
                format!(
                    "change {change:+.2}% (min {:.2}%), range position {pos:.2}",
                    config.min_change_pct
                ),
            )
            .with("change_pct", change)
            .with("range_position", pos)
        }
        FilterStep::Rsi => {
            let Some(rsi) = bundle.rsi else {
                return FilterCheck::unavailable(step, "rsi");
            };
            let (passed, bound) = if long {
                (rsi < config.rsi_oversold, config.rsi_oversold)
            } else {
                (rsi > config.rsi_overbought, config.rsi_overbought)
            };
            FilterCheck::new(step, passed, format!("rsi {rsi:.1} vs {bound:.1}")).with("rsi", rsi)
        }
        FilterStep::Trend => {
            let (Some(strength), Some(uptrend)) =
                (bundle.trend_strength_pct(), bundle.is_uptrend())
            else {
                return FilterCheck::unavailable(step, "trend");
            };
            let counter_trend = if long { !uptrend } else { uptrend };
            let limit = TREND_REJECT_FACTOR * config.trend_filter_strength;
            let passed = !(counter_trend && strength > limit);
            let detail = if counter_trend {
                format!("counter-trend, strength {strength:.2}% vs limit {limit:.2}%")
            } else {
                format!("with trend, strength {strength:.2}%")
            };
            FilterCheck::new(step, passed, detail).with("trend_strength_pct", strength)
        }
        FilterStep::Volume => {
            let Some(ratio) = bundle.volume_ratio else {
                return FilterCheck::unavailable(step, "volume_ratio");
            };
            let passed = ratio > config.min_volume_ratio;
            FilterCheck::new(
                step,
                passed,
                format!("volume ratio {ratio:.2} vs min {:.2}", config.min_volume_ratio),
            )
            .with("volume_ratio", ratio)
        }
        FilterStep::RegimeGate => FilterCheck::new(
            step,
            regime.can_trade,
            format!("regime {}: {}", regime.label, regime.reason),
        ),
        FilterStep::Risk => FilterCheck::new(step, true, String::from("risk levels computed")),
    }
}

/// Failed risk step, used when stop/target placement is indeterminate.
pub fn risk_failure(reason: String) -> FilterCheck {
    FilterCheck::new(FilterStep::Risk, false, reason)
}

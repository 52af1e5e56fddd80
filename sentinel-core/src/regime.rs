//! Regime Classifier: indicator bundle + recent closes → coarse market label.
//!
//! A pure decision table, first match wins. There is no hysteresis; callers
//! that classify continuously must debounce label changes themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::snapshot::IndicatorBundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeLabel {
    Bull,
    EarlyBull,
    Bear,
    Range,
    Volatile,
    Unknown,
}

impl RegimeLabel {
    pub fn is_bullish(&self) -> bool {
        matches!(self, RegimeLabel::Bull | RegimeLabel::EarlyBull)
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegimeLabel::Bull => "BULL",
            RegimeLabel::EarlyBull => "EARLY_BULL",
            RegimeLabel::Bear => "BEAR",
            RegimeLabel::Range => "RANGE",
            RegimeLabel::Volatile => "VOLATILE",
            RegimeLabel::Unknown => "UNKNOWN",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAssessment {
    pub label: RegimeLabel,
    pub can_trade: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RegimeConfig {
    /// Candle volatility above this forces VOLATILE.
    pub volatility_ceiling_pct: f64,
    /// EMA spread (percent of price) that confirms a trend.
    pub strong_trend_pct: f64,
    /// EMA spread that, with rising closes, marks an early uptrend.
    pub early_trend_pct: f64,
    /// Recent closes inspected for the early-bull slope.
    pub slope_bars: usize,
    pub trade_in_bear: bool,
    pub trade_in_range: bool,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            volatility_ceiling_pct: 10.0,
            strong_trend_pct: 1.5,
            early_trend_pct: 0.5,
            slope_bars: 5,
            trade_in_bear: true,
            trade_in_range: true,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.volatility_ceiling_pct > 0.0) {
            return Err(CoreError::InvalidConfig("volatility_ceiling_pct must be > 0".into()));
        }
        if !(self.early_trend_pct >= 0.0 && self.early_trend_pct <= self.strong_trend_pct) {
            return Err(CoreError::InvalidConfig(format!(
                "early_trend_pct ({}) must lie in [0, strong_trend_pct ({})]",
                self.early_trend_pct, self.strong_trend_pct
            )));
        }
        if self.slope_bars < 2 {
            return Err(CoreError::InvalidConfig("slope_bars must be >= 2".into()));
        }
        Ok(())
    }
}

pub fn classify(
    bundle: &IndicatorBundle,
    recent_closes: &[f64],
    config: &RegimeConfig,
) -> RegimeAssessment {
    if bundle.volatility_pct > config.volatility_ceiling_pct {
        return RegimeAssessment {
            label: RegimeLabel::Volatile,
            can_trade: false,
            reason: format!(
                "volatility {:.2}% above ceiling {:.2}%",
                bundle.volatility_pct, config.volatility_ceiling_pct
            ),
        };
    }

    let (Some(fast), Some(slow)) = (bundle.ema_fast, bundle.ema_slow) else {
        return RegimeAssessment {
            label: RegimeLabel::Unknown,
            can_trade: false,
            reason: "trend EMAs unavailable".into(),
        };
    };
    let strength = (fast - slow).abs() / bundle.close * 100.0;

    if fast > slow && strength >= config.strong_trend_pct {
        return RegimeAssessment {
            label: RegimeLabel::Bull,
            can_trade: true,
            reason: format!("fast EMA above slow, trend strength {strength:.2}%"),
        };
    }
    if fast > slow
        && strength >= config.early_trend_pct
        && closes_rising(recent_closes, config.slope_bars)
    {
        return RegimeAssessment {
            label: RegimeLabel::EarlyBull,
            can_trade: true,
            reason: format!(
                "fast EMA above slow, trend strength {strength:.2}% with rising closes"
            ),
        };
    }
    if fast < slow && strength >= config.strong_trend_pct {
        return RegimeAssessment {
            label: RegimeLabel::Bear,
            can_trade: config.trade_in_bear,
            reason: format!("fast EMA below slow, trend strength {strength:.2}%"),
        };
    }
    RegimeAssessment {
        label: RegimeLabel::Range,
        can_trade: config.trade_in_range,
        reason: format!("no confirmed trend, strength {strength:.2}%"),
    }
}

/// Net rise across the last `bars` closes with at least half the steps up.
fn closes_rising(closes: &[f64], bars: usize) -> bool {
    let start = closes.len().saturating_sub(bars);
    let tail = &closes[start..];
    if tail.len() < 2 {
        return false;
    }
    let ups = tail.windows(2).filter(|w| w[1] > w[0]).count();
    let steps = tail.len() - 1;
    tail[tail.len() - 1] > tail[0] && ups * 2 >= steps
}

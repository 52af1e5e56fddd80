//! Market conditions shared by every analyst.

use std::collections::BTreeSet;
use std::fmt;

use sentinel_core::domain::{Direction, Signal};
use sentinel_core::regime::RegimeLabel;
use sentinel_core::snapshot::IndicatorBundle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Oversold,
    Overbought,
    Fear,
    Greed,
    Extremes,
    Volatility,
    Momentum,
    Breakout,
    Ranging,
    LowVolume,
    UnclearTrend,
    DeepValue,
    SystemSignal,
    NoSignal,
    GoodRiskReward,
    BadRiskReward,
    ClearStop,
    UnclearStop,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Oversold => "oversold",
            Condition::Overbought => "overbought",
            Condition::Fear => "fear",
            Condition::Greed => "greed",
            Condition::Extremes => "extremes",
            Condition::Volatility => "volatility",
            Condition::Momentum => "momentum",
            Condition::Breakout => "breakout",
            Condition::Ranging => "ranging",
            Condition::LowVolume => "low volume",
            Condition::UnclearTrend => "unclear trend",
            Condition::DeepValue => "deep value",
            Condition::SystemSignal => "system signal",
            Condition::NoSignal => "no signal",
            Condition::GoodRiskReward => "good risk/reward",
            Condition::BadRiskReward => "bad risk/reward",
            Condition::ClearStop => "clear stop",
            Condition::UnclearStop => "unclear stop",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds that turn indicator values into conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConditionThresholds {
    pub oversold_rsi: f64,
    pub overbought_rsi: f64,
    /// Trailing drop (percent) that counts as fear; mirrored for greed.
    pub fear_greed_pct: f64,
    pub extreme_move_pct: f64,
    pub volatile_move_pct: f64,
    pub momentum_pct: f64,
    pub deep_value_pct: f64,
    pub ranging_pct: f64,
    pub breakout_volume_ratio: f64,
    pub low_volume_ratio: f64,
    /// RSI under which the system is considered to be signalling when the
    /// scorer produced no candidate.
    pub system_rsi: f64,
    pub good_risk_reward: f64,
}

impl Default for ConditionThresholds {
    fn default() -> Self {
        Self {
            oversold_rsi: 30.0,
            overbought_rsi: 70.0,
            fear_greed_pct: 5.0,
            extreme_move_pct: 7.0,
            volatile_move_pct: 5.0,
            momentum_pct: 3.0,
            deep_value_pct: 10.0,
            ranging_pct: 2.0,
            breakout_volume_ratio: 1.5,
            low_volume_ratio: 0.8,
            system_rsi: 40.0,
            good_risk_reward: 1.5,
        }
    }
}

/// The active conditions for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConditions {
    active: BTreeSet<Condition>,
}

impl MarketConditions {
    pub fn evaluate(
        bundle: &IndicatorBundle,
        regime: RegimeLabel,
        signal: Option<&Signal>,
        t: &ConditionThresholds,
    ) -> Self {
        let mut active = BTreeSet::new();
        let mut set = |c: Condition, on: bool| {
            if on {
                active.insert(c);
            }
        };

        let rsi = bundle.rsi;
        set(Condition::Oversold, rsi.is_some_and(|r| r < t.oversold_rsi));
        set(Condition::Overbought, rsi.is_some_and(|r| r > t.overbought_rsi));

        // Absent change is treated as "no move" for every move-based condition.
        let change = bundle.trailing_change_pct.or(bundle.change_pct);
        let moved = |f: &dyn Fn(f64) -> bool| change.is_some_and(f);
        set(Condition::Fear, moved(&|c| c < -t.fear_greed_pct));
        set(Condition::Greed, moved(&|c| c > t.fear_greed_pct));
        set(Condition::Extremes, moved(&|c| c.abs() > t.extreme_move_pct));
        set(Condition::Volatility, moved(&|c| c.abs() > t.volatile_move_pct));
        set(Condition::Momentum, moved(&|c| c > t.momentum_pct));
        set(Condition::DeepValue, moved(&|c| c < -t.deep_value_pct));
        set(Condition::Ranging, change.map_or(true, |c| c.abs() < t.ranging_pct));

        let volume = bundle.volume_ratio;
        set(
            Condition::Breakout,
            bundle.is_uptrend() == Some(true)
                && bundle.ema_fast.is_some_and(|f| bundle.close > f)
                && volume.is_some_and(|v| v > t.breakout_volume_ratio),
        );
        set(Condition::LowVolume, volume.is_some_and(|v| v < t.low_volume_ratio));
        set(
            Condition::UnclearTrend,
            matches!(regime, RegimeLabel::Range | RegimeLabel::Unknown),
        );

        match signal.filter(|s| s.direction.is_directional()) {
            Some(s) => {
                set(Condition::SystemSignal, true);
                let rr = s.risk_reward();
                set(Condition::GoodRiskReward, rr.is_some_and(|r| r >= t.good_risk_reward));
                set(Condition::BadRiskReward, rr.map_or(true, |r| r < t.good_risk_reward));
                set(Condition::ClearStop, s.levels_ordered());
                set(Condition::UnclearStop, !s.levels_ordered());
            }
            None => {
                set(Condition::SystemSignal, rsi.is_some_and(|r| r < t.system_rsi));
                set(Condition::NoSignal, true);
            }
        }

        Self { active }
    }

    pub fn has(&self, condition: Condition) -> bool {
        self.active.contains(&condition)
    }

    pub fn iter(&self) -> impl Iterator<Item = Condition> + '_ {
        self.active.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// True when the candidate signal trades with the bullish side.
pub fn signal_is_long(signal: Option<&Signal>) -> bool {
    signal.is_some_and(|s| s.direction == Direction::Long)
}

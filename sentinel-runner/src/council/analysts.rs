//! The analyst interface and the six standard philosophies.
//!
//! Every analyst starts from a neutral 50, gains points for each condition
//! its philosophy prefers and loses points for each it avoids, then applies
//! one philosophy-specific adjustment. Analysts hold no mutable state.

use sentinel_core::domain::{Direction, Signal};
use sentinel_core::regime::RegimeLabel;
use sentinel_core::snapshot::IndicatorBundle;
use serde::{Deserialize, Serialize};

use super::conditions::{signal_is_long, Condition, MarketConditions};
use super::{ActionThresholds, ConfidenceBand, CouncilAction};

pub const NEUTRAL_SCORE: f64 = 50.0;
pub const PREFERRED_BONUS: f64 = 15.0;
pub const AVOIDED_PENALTY: f64 = 20.0;

/// Everything an analyst may look at.
#[derive(Debug, Clone, Copy)]
pub struct AnalystInput<'a> {
    pub bundle: &'a IndicatorBundle,
    pub regime: RegimeLabel,
    pub signal: Option<&'a Signal>,
    pub conditions: &'a MarketConditions,
    pub thresholds: &'a ActionThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystOpinion {
    pub analyst_id: String,
    pub style: String,
    pub score: f64,
    pub action: CouncilAction,
    pub confidence: ConfidenceBand,
    pub rationale: Vec<String>,
    /// Verdict on the candidate signal, when one was supplied.
    pub recommendation: Option<String>,
}

impl AnalystOpinion {
    pub fn from_score(
        analyst: &dyn Analyst,
        score: f64,
        rationale: Vec<String>,
        input: &AnalystInput<'_>,
    ) -> Self {
        let action = input.thresholds.action_for(score);
        let confidence = match action {
            CouncilAction::Buy => ConfidenceBand::High,
            CouncilAction::Wait => ConfidenceBand::Medium,
            CouncilAction::Avoid => ConfidenceBand::Low,
        };
        let recommendation = input.signal.map(|_| {
            if signal_is_long(input.signal) && score < input.thresholds.wait_score {
                "do not take: conditions unfavourable".to_string()
            } else if signal_is_long(input.signal) && score >= input.thresholds.buy_score {
                "proceed: conditions favourable".to_string()
            } else {
                "wait: needs a better setup".to_string()
            }
        });
        Self {
            analyst_id: analyst.id().to_string(),
            style: analyst.style().to_string(),
            score,
            action,
            confidence,
            rationale,
            recommendation,
        }
    }
}

/// One independent heuristic voice on the council.
pub trait Analyst: Send + Sync {
    fn id(&self) -> &str;

    fn style(&self) -> &str;

    fn evaluate(&self, input: &AnalystInput<'_>) -> AnalystOpinion;
}

/// Conditions a philosophy welcomes and conditions it shuns.
#[derive(Debug, Clone, Copy)]
pub struct ConditionProfile {
    pub preferred: &'static [Condition],
    pub avoided: &'static [Condition],
}

impl ConditionProfile {
    /// Neutral score adjusted by the active conditions.
    pub fn score(&self, conditions: &MarketConditions, rationale: &mut Vec<String>) -> f64 {
        let mut score = NEUTRAL_SCORE;
        for &c in self.preferred {
            if conditions.has(c) {
                score += PREFERRED_BONUS;
                rationale.push(format!("+ {c}"));
            }
        }
        for &c in self.avoided {
            if conditions.has(c) {
                score -= AVOIDED_PENALTY;
                rationale.push(format!("- {c}"));
            }
        }
        score
    }
}

// ─── Value ──────────────────────────────────────────────────────────

/// Buys fear, shuns greed, and insists on a margin of safety below the
/// slow EMA. Penalises chasing a large rally.
#[derive(Debug, Clone)]
pub struct ValueAnalyst {
    /// How far above the slow EMA price may sit before there is no margin.
    pub margin_pct: f64,
}

impl ValueAnalyst {
    const PROFILE: ConditionProfile = ConditionProfile {
        preferred: &[Condition::Oversold, Condition::Fear, Condition::DeepValue],
        avoided: &[Condition::Overbought, Condition::Greed, Condition::Momentum],
    };
}

impl Analyst for ValueAnalyst {
    fn id(&self) -> &str {
        "value"
    }

    fn style(&self) -> &str {
        "value investor"
    }

    fn evaluate(&self, input: &AnalystInput<'_>) -> AnalystOpinion {
        let mut rationale = Vec::new();
        let mut score = Self::PROFILE.score(input.conditions, &mut rationale);
        let b = input.bundle;
        if let Some(slow) = b.ema_slow {
            if b.close > slow * (1.0 + self.margin_pct / 100.0) {
                score -= 30.0;
                rationale.push(format!(
                    "- price {:.4} too far above slow EMA {:.4}, no margin of safety",
                    b.close, slow
                ));
            } else {
                score += 20.0;
                rationale.push("+ price reasonable to accumulate".to_string());
            }
        }
        AnalystOpinion::from_score(self, score, rationale, input)
    }
}

// ─── Reflexivity ────────────────────────────────────────────────────

/// Looks for extremes and reversals; dislikes quiet, thin markets.
#[derive(Debug, Clone, Default)]
pub struct ReflexivityAnalyst;

impl ReflexivityAnalyst {
    const PROFILE: ConditionProfile = ConditionProfile {
        preferred: &[Condition::Extremes, Condition::Volatility],
        avoided: &[Condition::Ranging, Condition::LowVolume],
    };
}

impl Analyst for ReflexivityAnalyst {
    fn id(&self) -> &str {
        "reflexivity"
    }

    fn style(&self) -> &str {
        "macro reflexivity"
    }

    fn evaluate(&self, input: &AnalystInput<'_>) -> AnalystOpinion {
        let mut rationale = Vec::new();
        let mut score = Self::PROFILE.score(input.conditions, &mut rationale);
        let c = input.conditions;
        let stretched = c.has(Condition::Oversold) || c.has(Condition::Overbought);
        if c.has(Condition::Extremes) && stretched {
            score += 25.0;
            rationale.push("+ stretched extreme, reversal opportunity".to_string());
        }
        AnalystOpinion::from_score(self, score, rationale, input)
    }
}

// ─── Momentum ───────────────────────────────────────────────────────

/// Trend follower: rewards breakouts and confirmed upward momentum,
/// including the large rallies the value analyst refuses to chase.
#[derive(Debug, Clone, Default)]
pub struct MomentumAnalyst;

impl MomentumAnalyst {
    const PROFILE: ConditionProfile = ConditionProfile {
        preferred: &[Condition::Breakout, Condition::Momentum],
        avoided: &[Condition::Ranging, Condition::UnclearTrend],
    };
}

impl Analyst for MomentumAnalyst {
    fn id(&self) -> &str {
        "momentum"
    }

    fn style(&self) -> &str {
        "trend following"
    }

    fn evaluate(&self, input: &AnalystInput<'_>) -> AnalystOpinion {
        let mut rationale = Vec::new();
        let mut score = Self::PROFILE.score(input.conditions, &mut rationale);
        let b = input.bundle;
        let rising = b.trailing_change_pct.or(b.change_pct).is_some_and(|c| c > 0.0);
        if rising && b.rsi.is_some_and(|r| r > 60.0) {
            score += 20.0;
            rationale.push("+ bullish momentum confirmed".to_string());
        }
        if input.regime == RegimeLabel::Bull {
            score += 10.0;
            rationale.push("+ riding a bull regime".to_string());
        }
        AnalystOpinion::from_score(self, score, rationale, input)
    }
}

// ─── Risk manager ───────────────────────────────────────────────────

/// Judges the candidate's risk/reward and stop placement, nothing else.
#[derive(Debug, Clone, Default)]
pub struct RiskManagerAnalyst;

impl RiskManagerAnalyst {
    const PROFILE: ConditionProfile = ConditionProfile {
        preferred: &[Condition::GoodRiskReward, Condition::ClearStop],
        avoided: &[Condition::BadRiskReward, Condition::UnclearStop],
    };
}

impl Analyst for RiskManagerAnalyst {
    fn id(&self) -> &str {
        "risk_manager"
    }

    fn style(&self) -> &str {
        "risk management"
    }

    fn evaluate(&self, input: &AnalystInput<'_>) -> AnalystOpinion {
        let mut rationale = Vec::new();
        let mut score = Self::PROFILE.score(input.conditions, &mut rationale);
        match input.signal {
            None => rationale.push("no candidate to manage".to_string()),
            Some(s) => {
                if input.bundle.volatility_pct > 8.0 {
                    score -= 10.0;
                    rationale.push(format!(
                        "- {:.1}% candle range, stops at risk",
                        input.bundle.volatility_pct
                    ));
                }
                if let Some(rr) = s.risk_reward() {
                    rationale.push(format!("R:R {rr:.2}"));
                }
            }
        }
        AnalystOpinion::from_score(self, score, rationale, input)
    }
}

// ─── Systematic ─────────────────────────────────────────────────────

/// Follows the scorer: a clean system signal is worth backing.
#[derive(Debug, Clone, Default)]
pub struct SystematicAnalyst;

impl SystematicAnalyst {
    const PROFILE: ConditionProfile = ConditionProfile {
        preferred: &[Condition::SystemSignal],
        avoided: &[Condition::NoSignal],
    };
}

impl Analyst for SystematicAnalyst {
    fn id(&self) -> &str {
        "systematic"
    }

    fn style(&self) -> &str {
        "systematic"
    }

    fn evaluate(&self, input: &AnalystInput<'_>) -> AnalystOpinion {
        let mut rationale = Vec::new();
        let mut score = Self::PROFILE.score(input.conditions, &mut rationale);
        if let Some(s) = input.signal {
            match s.direction {
                Direction::Long => {
                    score += 10.0;
                    rationale.push(format!("+ scorer LONG at confidence {:.0}", s.confidence));
                }
                Direction::Short => {
                    score -= 15.0;
                    rationale.push(format!(
                        "- scorer favours SHORT at confidence {:.0}",
                        s.confidence
                    ));
                }
                Direction::Hold => {}
            }
        }
        AnalystOpinion::from_score(self, score, rationale, input)
    }
}

// ─── Deep value ─────────────────────────────────────────────────────

/// Wants a deep drawdown with little speculation in the tape.
#[derive(Debug, Clone)]
pub struct DeepValueAnalyst {
    /// Candle range above which the market is speculative.
    pub speculation_volatility_pct: f64,
}

impl DeepValueAnalyst {
    const PROFILE: ConditionProfile = ConditionProfile {
        preferred: &[Condition::DeepValue, Condition::Oversold],
        avoided: &[Condition::Greed, Condition::Overbought, Condition::Momentum],
    };
}

impl Analyst for DeepValueAnalyst {
    fn id(&self) -> &str {
        "deep_value"
    }

    fn style(&self) -> &str {
        "fundamental value"
    }

    fn evaluate(&self, input: &AnalystInput<'_>) -> AnalystOpinion {
        let mut rationale = Vec::new();
        let mut score = Self::PROFILE.score(input.conditions, &mut rationale);
        if input.bundle.volatility_pct > self.speculation_volatility_pct {
            score -= 10.0;
            rationale.push("- speculative tape".to_string());
        }
        AnalystOpinion::from_score(self, score, rationale, input)
    }
}

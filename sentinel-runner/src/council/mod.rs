//! Consensus Aggregator ("Council").
//!
//! Fans a snapshot out to a registry of independent analysts and combines
//! their opinions. The consensus action is the mode of the individual
//! actions; ties go to the action with the higher mean score, and a tie on
//! mean score goes to the more conservative action.

pub mod analysts;
pub mod conditions;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rayon::prelude::*;
use sentinel_core::domain::Signal;
use sentinel_core::regime::RegimeLabel;
use sentinel_core::snapshot::IndicatorBundle;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub use analysts::{
    Analyst, AnalystInput, AnalystOpinion, DeepValueAnalyst, MomentumAnalyst, ReflexivityAnalyst,
    RiskManagerAnalyst, SystematicAnalyst, ValueAnalyst,
};
pub use conditions::{Condition, ConditionThresholds, MarketConditions};

/// Errors from building or consulting the council.
#[derive(Debug, Error, PartialEq)]
pub enum CouncilError {
    #[error("council has no analysts registered")]
    EmptyRegistry,

    #[error("analyst id '{0}' registered twice")]
    DuplicateAnalyst(String),

    #[error("analyst '{analyst}' returned a non-finite score {score}")]
    InvalidOpinion { analyst: String, score: f64 },

    #[error("invalid council config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouncilAction {
    Buy,
    Wait,
    Avoid,
}

impl CouncilAction {
    /// Higher is more conservative.
    fn caution(&self) -> u8 {
        match self {
            CouncilAction::Buy => 0,
            CouncilAction::Wait => 1,
            CouncilAction::Avoid => 2,
        }
    }
}

impl fmt::Display for CouncilAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CouncilAction::Buy => "BUY",
            CouncilAction::Wait => "WAIT",
            CouncilAction::Avoid => "AVOID",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// HIGH above 70, MEDIUM above 50, LOW otherwise.
    pub fn for_average(score: f64) -> Self {
        if score > 70.0 {
            ConfidenceBand::High
        } else if score > 50.0 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Score cut-offs mapping an analyst score to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ActionThresholds {
    pub buy_score: f64,
    pub wait_score: f64,
}

impl Default for ActionThresholds {
    fn default() -> Self {
        Self {
            buy_score: 70.0,
            wait_score: 50.0,
        }
    }
}

impl ActionThresholds {
    pub fn action_for(&self, score: f64) -> CouncilAction {
        if score >= self.buy_score {
            CouncilAction::Buy
        } else if score >= self.wait_score {
            CouncilAction::Wait
        } else {
            CouncilAction::Avoid
        }
    }
}

/// Observations about the opinions and the market, beyond the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insight {
    UnanimousBullish,
    UnanimousBearish,
    HighDivergence,
    RsiOversold,
    RsiOverbought,
    ExtremeVolatility,
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Insight::UnanimousBullish => "unanimous bullish consensus",
            Insight::UnanimousBearish => "unanimous bearish consensus",
            Insight::HighDivergence => "high divergence between analysts",
            Insight::RsiOversold => "RSI oversold, potential rebound",
            Insight::RsiOverbought => "RSI overbought, beware of a correction",
            Insight::ExtremeVolatility => "extreme move, manage risk",
        })
    }
}

/// Actionable summary of the consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    OpenLong,
    AvoidOrShort,
    Wait,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CouncilConfig {
    /// Dispatch analysts on the rayon pool.
    pub parallel: bool,
    pub actions: ActionThresholds,
    pub conditions: ConditionThresholds,
    pub value_margin_pct: f64,
    pub speculation_volatility_pct: f64,
    /// Score spread above which the council is flagged as divergent.
    pub divergence_spread: f64,
    /// Absolute trailing move (percent) that raises the extreme-volatility insight.
    pub extreme_volatility_pct: f64,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            actions: ActionThresholds::default(),
            conditions: ConditionThresholds::default(),
            value_margin_pct: 5.0,
            speculation_volatility_pct: 5.0,
            divergence_spread: 50.0,
            extreme_volatility_pct: 10.0,
        }
    }
}

impl CouncilConfig {
    pub fn validate(&self) -> Result<(), CouncilError> {
        if !(self.actions.wait_score < self.actions.buy_score) {
            return Err(CouncilError::InvalidConfig("wait_score must be below buy_score".into()));
        }
        if !(self.value_margin_pct >= 0.0) || !(self.divergence_spread > 0.0) {
            return Err(CouncilError::InvalidConfig(
                "value_margin_pct must be >= 0 and divergence_spread > 0".into(),
            ));
        }
        if !(self.extreme_volatility_pct > 0.0) {
            return Err(CouncilError::InvalidConfig(
                "extreme_volatility_pct must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub action: CouncilAction,
    pub average_score: f64,
    /// True iff every analyst chose the same action.
    pub agreement: bool,
    pub confidence: ConfidenceBand,
    pub verdict: Verdict,
    pub insights: Vec<Insight>,
    pub opinions: Vec<AnalystOpinion>,
}

pub struct Council {
    analysts: Vec<Box<dyn Analyst>>,
    config: CouncilConfig,
}

impl fmt::Debug for Council {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Council")
            .field("analysts", &self.analyst_ids())
            .field("config", &self.config)
            .finish()
    }
}

impl Council {
    pub fn new(
        analysts: Vec<Box<dyn Analyst>>,
        config: CouncilConfig,
    ) -> Result<Self, CouncilError> {
        config.validate()?;
        if analysts.is_empty() {
            return Err(CouncilError::EmptyRegistry);
        }
        let mut seen = BTreeSet::new();
        for a in &analysts {
            if !seen.insert(a.id().to_string()) {
                return Err(CouncilError::DuplicateAnalyst(a.id().to_string()));
            }
        }
        Ok(Self { analysts, config })
    }

    /// The six standard philosophies.
    pub fn standard(config: CouncilConfig) -> Result<Self, CouncilError> {
        let analysts: Vec<Box<dyn Analyst>> = vec![
            Box::new(ValueAnalyst {
                margin_pct: config.value_margin_pct,
            }),
            Box::new(ReflexivityAnalyst),
            Box::new(MomentumAnalyst),
            Box::new(RiskManagerAnalyst),
            Box::new(SystematicAnalyst),
            Box::new(DeepValueAnalyst {
                speculation_volatility_pct: config.speculation_volatility_pct,
            }),
        ];
        Self::new(analysts, config)
    }

    pub fn config(&self) -> &CouncilConfig {
        &self.config
    }

    pub fn analyst_ids(&self) -> Vec<&str> {
        self.analysts.iter().map(|a| a.id()).collect()
    }

    /// Consult every analyst and combine their opinions.
    pub fn convene(
        &self,
        bundle: &IndicatorBundle,
        regime: RegimeLabel,
        signal: Option<&Signal>,
    ) -> Result<ConsensusResult, CouncilError> {
        let conditions =
            MarketConditions::evaluate(bundle, regime, signal, &self.config.conditions);
        let input = AnalystInput {
            bundle,
            regime,
            signal,
            conditions: &conditions,
            thresholds: &self.config.actions,
        };

        let opinions: Vec<AnalystOpinion> = if self.config.parallel {
            self.analysts.par_iter().map(|a| a.evaluate(&input)).collect()
        } else {
            self.analysts.iter().map(|a| a.evaluate(&input)).collect()
        };

        if let Some(bad) = opinions.iter().find(|o| !o.score.is_finite()) {
            return Err(CouncilError::InvalidOpinion {
                analyst: bad.analyst_id.clone(),
                score: bad.score,
            });
        }

        let result = self.combine(bundle, opinions);
        info!(
            action = %result.action,
            average_score = result.average_score,
            agreement = result.agreement,
            analysts = result.opinions.len(),
            "council consensus"
        );
        Ok(result)
    }

    fn combine(&self, bundle: &IndicatorBundle, opinions: Vec<AnalystOpinion>) -> ConsensusResult {
        let n = opinions.len() as f64;
        let average_score = opinions.iter().map(|o| o.score).sum::<f64>() / n;

        let mut tally: BTreeMap<CouncilAction, (usize, f64)> = BTreeMap::new();
        for o in &opinions {
            let entry = tally.entry(o.action).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += o.score;
        }
        let action = tally
            .iter()
            .map(|(&action, &(count, sum))| (action, count, sum / count as f64))
            .max_by(|a, b| {
                a.1.cmp(&b.1)
                    .then(a.2.total_cmp(&b.2))
                    .then(a.0.caution().cmp(&b.0.caution()))
            })
            .map(|(action, _, _)| action)
            .unwrap_or(CouncilAction::Wait);
        let agreement = tally.len() == 1;

        let buy = average_score >= self.config.actions.buy_score && action == CouncilAction::Buy;
        let verdict = if buy {
            Verdict::OpenLong
        } else if average_score <= 30.0 {
            Verdict::AvoidOrShort
        } else {
            Verdict::Wait
        };

        let insights = self.insights(bundle, &opinions);

        ConsensusResult {
            action,
            average_score,
            agreement,
            confidence: ConfidenceBand::for_average(average_score),
            verdict,
            insights,
            opinions,
        }
    }

    fn insights(&self, bundle: &IndicatorBundle, opinions: &[AnalystOpinion]) -> Vec<Insight> {
        let mut insights = Vec::new();
        let scores = || opinions.iter().map(|o| o.score);
        if scores().all(|s| s > 70.0) {
            insights.push(Insight::UnanimousBullish);
        } else if scores().all(|s| s < 30.0) {
            insights.push(Insight::UnanimousBearish);
        }
        let max = scores().fold(f64::NEG_INFINITY, f64::max);
        let min = scores().fold(f64::INFINITY, f64::min);
        if max - min > self.config.divergence_spread {
            insights.push(Insight::HighDivergence);
        }
        match bundle.rsi {
            Some(r) if r < self.config.conditions.oversold_rsi => {
                insights.push(Insight::RsiOversold)
            }
            Some(r) if r > self.config.conditions.overbought_rsi => {
                insights.push(Insight::RsiOverbought)
            }
            _ => {}
        }
        if bundle
            .trailing_change_pct
            .or(bundle.change_pct)
            .is_some_and(|c| c.abs() > self.config.extreme_volatility_pct)
        {
            insights.push(Insight::ExtremeVolatility);
        }
        insights
    }
}

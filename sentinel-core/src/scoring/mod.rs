//! Signal Scorer: indicator bundle + regime + timeframe thresholds → Signal or HOLD.
//!
//! The candidate direction follows the sign of the latest change (a drop is
//! a LONG candidate, a rally a SHORT candidate). The candidate then has to
//! clear every step of the hard-filter chain; the first failing step
//! short-circuits to HOLD with the trace of everything evaluated so far.

pub mod filters;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Direction, Signal, Timeframe};
use crate::error::{CoreError, Result};
use crate::regime::RegimeAssessment;
use crate::risk::{compute_risk, RiskConfig, RiskParameters, RiskRequest, MAX_CONFIDENCE};
use crate::snapshot::IndicatorBundle;

pub use filters::{FilterCheck, FilterStep};

/// Scorer source tag carried on emitted signals.
pub const SCORER_ID: &str = "signal_scorer";

/// Per-timeframe scoring thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeframeConfig {
    pub min_change_pct: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub min_volume_ratio: f64,
    pub max_volatility_pct: f64,
    pub atr_multiplier: f64,
    pub min_confidence: f64,
    pub trend_filter_strength: f64,
}

impl TimeframeConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CoreError::InvalidConfig(msg));
        if !(0.0 < self.rsi_oversold
            && self.rsi_oversold < self.rsi_overbought
            && self.rsi_overbought < 100.0)
        {
            return invalid(format!(
                "rsi thresholds must satisfy 0 < oversold ({}) < overbought ({}) < 100",
                self.rsi_oversold, self.rsi_overbought
            ));
        }
        if !(self.min_change_pct > 0.0) {
            return invalid("min_change_pct must be > 0".into());
        }
        if !(self.min_volume_ratio > 0.0) {
            return invalid("min_volume_ratio must be > 0".into());
        }
        if !(self.max_volatility_pct > 0.0) {
            return invalid("max_volatility_pct must be > 0".into());
        }
        if !(self.atr_multiplier > 0.0) {
            return invalid("atr_multiplier must be > 0".into());
        }
        if !(0.0..=MAX_CONFIDENCE).contains(&self.min_confidence) {
            return invalid(format!("min_confidence must lie in [0, {MAX_CONFIDENCE}]"));
        }
        if !(self.trend_filter_strength >= 0.0) {
            return invalid("trend_filter_strength must be >= 0".into());
        }
        Ok(())
    }
}

/// A signal that cleared the chain, with its risk parameters and trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSignal {
    pub signal: Signal,
    pub risk: RiskParameters,
    pub trace: Vec<FilterCheck>,
}

/// Why a candidate became a HOLD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub direction: Direction,
    pub failed_step: FilterStep,
    pub reason: String,
    pub trace: Vec<FilterCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreDecision {
    Signal(ScoredSignal),
    Hold(Rejection),
}

impl ScoreDecision {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            ScoreDecision::Signal(s) => Some(&s.signal),
            ScoreDecision::Hold(_) => None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.signal().map_or(Direction::Hold, |s| s.direction)
    }

    pub fn trace(&self) -> &[FilterCheck] {
        match self {
            ScoreDecision::Signal(s) => &s.trace,
            ScoreDecision::Hold(r) => &r.trace,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalScorer {
    timeframe: Timeframe,
    config: TimeframeConfig,
    risk: RiskConfig,
}

impl SignalScorer {
    pub fn new(timeframe: Timeframe, config: TimeframeConfig, risk: RiskConfig) -> Result<Self> {
        config.validate()?;
        risk.validate()?;
        Ok(Self {
            timeframe,
            config,
            risk,
        })
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn config(&self) -> &TimeframeConfig {
        &self.config
    }

    pub fn risk_config(&self) -> &RiskConfig {
        &self.risk
    }

    pub fn score(
        &self,
        symbol: &str,
        bundle: &IndicatorBundle,
        regime: &RegimeAssessment,
    ) -> ScoreDecision {
        self.score_with_exposure(symbol, bundle, regime, 0.0)
    }

    /// Score with `open_notional` already held in `symbol`, which shrinks or
    /// blocks the new position.
    pub fn score_with_exposure(
        &self,
        symbol: &str,
        bundle: &IndicatorBundle,
        regime: &RegimeAssessment,
        open_notional: f64,
    ) -> ScoreDecision {
        let direction = match bundle.change_pct {
            Some(change) if change > 0.0 => Direction::Short,
            _ => Direction::Long,
        };

        let mut trace = Vec::with_capacity(FilterStep::CHAIN.len() + 1);
        for step in FilterStep::CHAIN {
            let check = filters::evaluate(step, direction, bundle, regime, &self.config);
            let passed = check.passed;
            trace.push(check);
            if !passed {
                return self.reject(direction, trace);
            }
        }

        let confidence = self.confidence(direction, bundle);
        let request = RiskRequest {
            direction,
            entry_price: bundle.close,
            confidence,
            atr: bundle.atr,
            volatility_pct: bundle.volatility_pct,
            open_notional,
        };
        let risk = match compute_risk(
            &request,
            self.config.atr_multiplier,
            self.config.min_confidence,
            &self.risk,
        ) {
            Ok(risk) => risk,
            Err(err) => {
                trace.push(filters::risk_failure(err.to_string()));
                return self.reject(direction, trace);
            }
        };
        trace.push(filters::evaluate(FilterStep::Risk, direction, bundle, regime, &self.config));

        let mut reasoning: Vec<String> = trace
            .iter()
            .map(|c| format!("{}: {}", c.step, c.detail))
            .collect();
        reasoning.push(format!("confidence {confidence:.0}"));

        ScoreDecision::Signal(ScoredSignal {
            signal: Signal {
                symbol: symbol.to_string(),
                timeframe: self.timeframe,
                direction,
                confidence,
                entry_price: bundle.close,
                stop_loss: risk.stop_loss,
                take_profit: risk.take_profit,
                reasoning,
                source_analyst: SCORER_ID.to_string(),
                generated_at: bundle.timestamp,
            },
            risk,
            trace,
        })
    }

    /// min_confidence plus extremity bonuses, capped at 90.
    pub fn confidence(&self, direction: Direction, bundle: &IndicatorBundle) -> f64 {
        let c = &self.config;
        let mut confidence = c.min_confidence;
        let rsi = bundle.rsi.unwrap_or(50.0);
        let extreme_rsi = match direction {
            Direction::Short => rsi > c.rsi_overbought + 5.0,
            _ => rsi < c.rsi_oversold - 5.0,
        };
        if extreme_rsi {
            confidence += 10.0;
        }
        if bundle.volume_ratio.is_some_and(|v| v > c.min_volume_ratio + 0.3) {
            confidence += 5.0;
        }
        let extreme_range = match direction {
            Direction::Short => bundle.range_position > 0.8,
            _ => bundle.range_position < 0.2,
        };
        if extreme_range {
            confidence += 5.0;
        }
        confidence.min(MAX_CONFIDENCE)
    }

    fn reject(&self, direction: Direction, trace: Vec<FilterCheck>) -> ScoreDecision {
        let (failed_step, reason) = trace
            .last()
            .map(|c| (c.step, c.detail.clone()))
            .unwrap_or((FilterStep::Volatility, String::from("no filter evaluated")));
        debug!(
            timeframe = %self.timeframe,
            %direction,
            step = %failed_step,
            %reason,
            "candidate rejected"
        );
        ScoreDecision::Hold(Rejection {
            direction,
            failed_step,
            reason,
            trace,
        })
    }
}

//! Evaluation pipeline: Snapshot → Regime → Scorer → Risk, with an optional
//! council consult on top. An attached position ledger feeds open exposure
//! into sizing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sentinel_core::domain::{Candle, OrderBookSnapshot, Timeframe};
use sentinel_core::regime::{classify, RegimeAssessment, RegimeConfig};
use sentinel_core::scoring::{ScoreDecision, SignalScorer};
use sentinel_core::snapshot::{recent_closes, IndicatorBundle, SnapshotBuilder};
use sentinel_core::{CoreError, SystemConfig};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::council::{ConsensusResult, Council, CouncilError};
use crate::provider::{LoadError, MarketDataProvider, PositionLedger};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Council(#[from] CouncilError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no scorer configured for timeframe {0}")]
    UnconfiguredTimeframe(Timeframe),
}

impl PipelineError {
    /// Only a short history clears by waiting for more candles.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::Core(e) if e.is_recoverable())
    }
}

/// Everything one evaluation produced.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bundle: IndicatorBundle,
    pub regime: RegimeAssessment,
    pub decision: ScoreDecision,
    /// Present only when a council is attached.
    pub consensus: Option<ConsensusResult>,
}

pub struct Pipeline {
    builder: SnapshotBuilder,
    regime: RegimeConfig,
    scorers: BTreeMap<Timeframe, SignalScorer>,
    council: Option<Council>,
    ledger: Option<Arc<dyn PositionLedger>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("builder", &self.builder)
            .field("regime", &self.regime)
            .field("scorers", &self.scorers)
            .field("council", &self.council)
            .field("ledger", &self.ledger.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Build one scorer per configured timeframe.
    pub fn from_config(config: &SystemConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let scorers = config
            .timeframes
            .keys()
            .map(|&tf| config.scorer(tf).map(|scorer| (tf, scorer)))
            .collect::<Result<BTreeMap<_, _>, CoreError>>()?;
        Ok(Self {
            builder: SnapshotBuilder::new(config.snapshot.clone())?,
            regime: config.regime.clone(),
            scorers,
            council: None,
            ledger: None,
        })
    }

    pub fn with_council(mut self, council: Council) -> Self {
        self.council = Some(council);
        self
    }

    /// Size new signals against the positions this ledger reports.
    pub fn with_ledger(mut self, ledger: Arc<dyn PositionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Notional already open in `symbol`, zero without a ledger.
    pub fn open_notional(&self, symbol: &str) -> f64 {
        self.ledger
            .as_ref()
            .and_then(|ledger| ledger.get_open_position(symbol))
            .map_or(0.0, |position| position.notional())
    }

    pub fn builder(&self) -> &SnapshotBuilder {
        &self.builder
    }

    pub fn council(&self) -> Option<&Council> {
        self.council.as_ref()
    }

    pub fn scorer(&self, timeframe: Timeframe) -> Result<&SignalScorer, PipelineError> {
        self.scorers
            .get(&timeframe)
            .ok_or(PipelineError::UnconfiguredTimeframe(timeframe))
    }

    pub fn timeframes(&self) -> impl Iterator<Item = Timeframe> + '_ {
        self.scorers.keys().copied()
    }

    /// Snapshot, regime and score without consulting the council.
    pub fn score(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
        book: Option<&OrderBookSnapshot>,
    ) -> Result<(IndicatorBundle, RegimeAssessment, ScoreDecision), PipelineError> {
        let scorer = self.scorer(timeframe)?;
        let bundle = self.builder.build(candles, book)?;
        let closes = recent_closes(candles, self.regime.slope_bars);
        let regime = classify(&bundle, &closes, &self.regime);
        let open_notional = self.open_notional(symbol);
        let decision = scorer.score_with_exposure(symbol, &bundle, &regime, open_notional);
        Ok((bundle, regime, decision))
    }

    pub fn evaluate(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
        book: Option<&OrderBookSnapshot>,
    ) -> Result<Evaluation, PipelineError> {
        let (bundle, regime, decision) = self.score(symbol, timeframe, candles, book)?;
        let consensus = match &self.council {
            Some(council) => Some(council.convene(&bundle, regime.label, decision.signal())?),
            None => None,
        };
        debug!(
            symbol,
            %timeframe,
            regime = %regime.label,
            direction = %decision.direction(),
            "evaluated"
        );
        Ok(Evaluation {
            symbol: symbol.to_string(),
            timeframe,
            bundle,
            regime,
            decision,
            consensus,
        })
    }

    /// Pull the history and book from a provider, then evaluate.
    pub fn evaluate_from(
        &self,
        provider: &dyn MarketDataProvider,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Evaluation, PipelineError> {
        let candles = provider.get_candles(symbol, timeframe, self.builder.full_history())?;
        let book = provider.get_order_book(symbol, self.builder.config().order_flow.depth_levels)?;
        self.evaluate(symbol, timeframe, &candles, book.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_timeframe_is_reported() {
        let pipeline = Pipeline::from_config(&SystemConfig::balanced_preset().unwrap()).unwrap();
        let err = pipeline.scorer(Timeframe::D1).unwrap_err();
        assert!(matches!(err, PipelineError::UnconfiguredTimeframe(Timeframe::D1)));
        assert_eq!(pipeline.timeframes().count(), 3);
    }

    #[test]
    fn short_history_is_recoverable() {
        let pipeline = Pipeline::from_config(&SystemConfig::balanced_preset().unwrap()).unwrap();
        let err = pipeline.evaluate("BTCUSDT", Timeframe::H1, &[], None).unwrap_err();
        assert!(err.is_recoverable());
    }
}

//! Historical replay.
//!
//! Every bar after warmup is scored on the trailing `history_bars` candles,
//! the same way a live host would see it. Each emitted signal is simulated
//! on the candles that follow. Bars are independent, so they are evaluated
//! on the rayon pool and collected in bar order; the one-position rule is
//! applied afterwards so parallel and sequential replays agree exactly.

use rayon::prelude::*;
use sentinel_core::domain::{Candle, Signal, Timeframe, TradeOutcome};
use sentinel_core::scoring::ScoreDecision;
use sentinel_core::simulator::{Horizon, TradeSimulator};
use sentinel_core::{CoreError, SystemConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics::BacktestMetrics;
use crate::pipeline::{Pipeline, PipelineError};

/// Bumped whenever `BacktestReport` changes shape.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("not enough candles: {available} available, {required} required")]
    NotEnoughData { required: usize, available: usize },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BacktestConfig {
    /// How far a trade is followed before it is time-exited.
    pub horizon: Horizon,
    /// Skip signals raised while an earlier trade is still running.
    pub one_position_at_a_time: bool,
    pub parallel: bool,
    /// Candles before the first scored bar. Defaults to the snapshot's full
    /// history requirement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_bars: Option<usize>,
    /// Trailing candles handed to the snapshot builder per bar.
    pub history_bars: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            horizon: Horizon::Bars(20),
            one_position_at_a_time: true,
            parallel: true,
            warmup_bars: None,
            history_bars: 200,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.horizon == Horizon::Bars(0) {
            return Err(CoreError::InvalidConfig(
                "backtest.horizon must cover at least one bar".into(),
            ));
        }
        if self.history_bars == 0 {
            return Err(CoreError::InvalidConfig("backtest.history_bars must be > 0".into()));
        }
        Ok(())
    }
}

/// One simulated signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    /// Index of the candle the signal was generated on.
    pub bar_index: usize,
    /// Index of the candle the trade closed on (last seen candle if open).
    pub exit_index: usize,
    pub signal: Signal,
    pub outcome: TradeOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub schema_version: u32,
    pub run_id: String,
    pub dataset_hash: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: usize,
    pub warmup: usize,
    pub signals_emitted: usize,
    pub skipped_overlapping: usize,
    pub trades: Vec<BacktestTrade>,
    pub metrics: BacktestMetrics,
}

impl BacktestReport {
    pub fn outcomes(&self) -> Vec<TradeOutcome> {
        self.trades.iter().map(|t| t.outcome.clone()).collect()
    }
}

/// The parts of a run that determine its result. `parallel` is left out.
#[derive(Serialize)]
struct RunKey<'a> {
    system: &'a SystemConfig,
    horizon: Horizon,
    one_position_at_a_time: bool,
    warmup: usize,
    history_bars: usize,
    symbol: &'a str,
    timeframe: Timeframe,
}

#[derive(Debug)]
pub struct Backtester {
    system: SystemConfig,
    config: BacktestConfig,
    pipeline: Pipeline,
    simulator: TradeSimulator,
}

impl Backtester {
    pub fn new(system: SystemConfig, config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        let pipeline = Pipeline::from_config(&system)?;
        let simulator = TradeSimulator::new(system.simulator.clone())?;
        Ok(Self {
            system,
            config,
            pipeline,
            simulator,
        })
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    fn warmup(&self) -> usize {
        let builder = self.pipeline.builder();
        self.config
            .warmup_bars
            .unwrap_or_else(|| builder.full_history())
            .max(builder.min_history())
    }

    pub fn run(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<BacktestReport, BacktestError> {
        self.pipeline.scorer(timeframe)?;
        validate_series(candles, timeframe)?;

        let warmup = self.warmup();
        if candles.len() <= warmup {
            return Err(BacktestError::NotEnoughData {
                required: warmup + 1,
                available: candles.len(),
            });
        }

        let bars: Vec<usize> = (warmup - 1..candles.len()).collect();
        let evaluated: Vec<Option<BacktestTrade>> = if self.config.parallel {
            bars.par_iter()
                .map(|&i| self.replay_bar(symbol, timeframe, candles, i))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            bars.iter()
                .map(|&i| self.replay_bar(symbol, timeframe, candles, i))
                .collect::<Result<Vec<_>, _>>()?
        };

        let candidates: Vec<BacktestTrade> = evaluated.into_iter().flatten().collect();
        let signals_emitted = candidates.len();
        let trades = if self.config.one_position_at_a_time {
            drop_overlapping(candidates)
        } else {
            candidates
        };
        let skipped_overlapping = signals_emitted - trades.len();

        let outcomes: Vec<TradeOutcome> = trades.iter().map(|t| t.outcome.clone()).collect();
        let metrics = BacktestMetrics::compute(&outcomes);

        let dataset_hash = compute_dataset_hash(candles);
        let run_id = self.run_id(symbol, timeframe, warmup, &dataset_hash)?;

        info!(
            symbol,
            %timeframe,
            bars = candles.len(),
            signals = signals_emitted,
            trades = trades.len(),
            win_rate = metrics.win_rate,
            expectancy_r = metrics.expectancy_r,
            "backtest complete"
        );

        Ok(BacktestReport {
            schema_version: SCHEMA_VERSION,
            run_id,
            dataset_hash,
            symbol: symbol.to_string(),
            timeframe,
            bars: candles.len(),
            warmup,
            signals_emitted,
            skipped_overlapping,
            trades,
            metrics,
        })
    }

    fn replay_bar(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
        i: usize,
    ) -> Result<Option<BacktestTrade>, BacktestError> {
        let start = (i + 1).saturating_sub(self.config.history_bars);
        let history = &candles[start..=i];
        let (_, _, decision) = self.pipeline.score(symbol, timeframe, history, None)?;
        let ScoreDecision::Signal(scored) = decision else {
            return Ok(None);
        };

        let horizon = self.config.horizon;
        let end = match horizon {
            Horizon::Bars(n) => (i + 1 + n).min(candles.len()),
            Horizon::Full => candles.len(),
        };
        let outcome = self
            .simulator
            .simulate(&scored.signal, history, &candles[i + 1..end], horizon)?;
        debug!(
            bar = i,
            direction = %scored.signal.direction,
            result = ?outcome.result,
            "replayed signal"
        );

        Ok(Some(BacktestTrade {
            bar_index: i,
            exit_index: i + outcome.bars_to_exit,
            signal: scored.signal,
            outcome,
        }))
    }

    fn run_id(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        warmup: usize,
        dataset_hash: &str,
    ) -> Result<String, BacktestError> {
        let key = RunKey {
            system: &self.system,
            horizon: self.config.horizon,
            one_position_at_a_time: self.config.one_position_at_a_time,
            warmup,
            history_bars: self.config.history_bars,
            symbol,
            timeframe,
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update(&serde_json::to_vec(&key)?);
        hasher.update(dataset_hash.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Keep a trade only once the previous kept trade has exited.
fn drop_overlapping(candidates: Vec<BacktestTrade>) -> Vec<BacktestTrade> {
    let mut kept = Vec::with_capacity(candidates.len());
    let mut free_from = 0;
    for trade in candidates {
        if trade.bar_index < free_from {
            continue;
        }
        free_from = if trade.outcome.is_closed() {
            trade.exit_index
        } else {
            usize::MAX
        };
        kept.push(trade);
    }
    kept
}

fn validate_series(candles: &[Candle], timeframe: Timeframe) -> Result<(), CoreError> {
    let interval = timeframe.interval();
    for (index, pair) in candles.windows(2).enumerate() {
        let expected = pair[0].timestamp + interval;
        if pair[1].timestamp != expected {
            return Err(CoreError::NonContiguousWindow {
                index: index + 1,
                detail: format!("expected candle at {expected}, found {}", pair[1].timestamp),
            });
        }
    }
    if let Some(index) = candles.iter().position(|c| !c.is_sane()) {
        return Err(CoreError::InvalidInput(format!("candle {index} fails OHLC sanity")));
    }
    Ok(())
}

/// Content hash of a candle series.
pub fn compute_dataset_hash(candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in candles {
        hasher.update(&c.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(&c.open.to_le_bytes());
        hasher.update(&c.high.to_le_bytes());
        hasher.update(&c.low.to_le_bytes());
        hasher.update(&c.close.to_le_bytes());
        hasher.update(&c.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Stable fingerprint of a single outcome, comparable across processes.
pub fn outcome_fingerprint(outcome: &TradeOutcome) -> Result<String, serde_json::Error> {
    Ok(blake3::hash(&serde_json::to_vec(outcome)?).to_hex().to_string())
}

//! Live signal tracker.
//!
//! Holds emitted signals and resolves them as closed candles arrive, using
//! the same simulator the backtest uses, so a live result and a replayed
//! result for the same candles are identical. A stopped-out signal stays
//! pending with its result fixed until the horizon has elapsed, because its
//! loss tags depend on the candles after the stop.

use chrono::{DateTime, Utc};
use sentinel_core::domain::{Candle, Signal, Timeframe, TradeOutcome};
use sentinel_core::simulator::{is_settled, Horizon, SimulatorConfig, TradeSimulator};
use sentinel_core::CoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("signal {id}: expected candle at {expected}, got {found}")]
    Gap {
        id: u64,
        expected: DateTime<Utc>,
        found: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedSignal {
    pub id: u64,
    pub signal: Signal,
    /// Candles up to and including the signal candle.
    pub context: Vec<Candle>,
    /// Closed candles seen since the signal.
    pub forward: Vec<Candle>,
    /// Latest simulation. A stop exit shows here before it resolves, with
    /// loss tags still to be finalised.
    pub outcome: Option<TradeOutcome>,
}

impl TrackedSignal {
    fn expected_next(&self) -> DateTime<Utc> {
        let last = self.forward.last().map_or(self.signal.generated_at, |c| c.timestamp);
        last + self.signal.timeframe.interval()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSignal {
    pub id: u64,
    pub signal: Signal,
    pub outcome: TradeOutcome,
}

#[derive(Debug)]
pub struct SignalTracker {
    simulator: TradeSimulator,
    horizon: Horizon,
    next_id: u64,
    pending: Vec<TrackedSignal>,
    resolved: Vec<ResolvedSignal>,
}

impl SignalTracker {
    /// Tracker that follows each signal for the quick horizon.
    pub fn new(config: SimulatorConfig) -> Result<Self, TrackerError> {
        let horizon = config.quick_horizon();
        Ok(Self {
            simulator: TradeSimulator::new(config)?,
            horizon,
            next_id: 1,
            pending: Vec::new(),
            resolved: Vec::new(),
        })
    }

    /// Follow signals for `horizon` instead. Only a bounded bar count can
    /// elapse live, so `Horizon::Full` and zero bars are refused.
    pub fn with_horizon(mut self, horizon: Horizon) -> Result<Self, TrackerError> {
        horizon.validate_live()?;
        self.horizon = horizon;
        Ok(self)
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Start tracking `signal`. `context` is kept for loss tagging.
    pub fn register(&mut self, signal: Signal, context: &[Candle]) -> Result<u64, TrackerError> {
        if !signal.direction.is_directional() || !signal.levels_ordered() {
            return Err(CoreError::InvalidInput(format!(
                "cannot track {} signal with stop {}, entry {}, target {}",
                signal.direction, signal.stop_loss, signal.entry_price, signal.take_profit
            ))
            .into());
        }
        let keep = self.simulator.config().context_bars.min(context.len());
        let id = self.next_id;
        self.next_id += 1;
        info!(id, symbol = %signal.symbol, direction = %signal.direction, "tracking signal");
        self.pending.push(TrackedSignal {
            id,
            signal,
            context: context[context.len() - keep..].to_vec(),
            forward: Vec::new(),
            outcome: None,
        });
        Ok(id)
    }

    /// Feed a newly closed candle. Returns the signals it resolved.
    ///
    /// Candles at or before the last one seen are ignored. A gap leaves every
    /// tracked signal untouched and is reported as an error.
    pub fn on_candle(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        candle: Candle,
    ) -> Result<Vec<ResolvedSignal>, TrackerError> {
        if !candle.is_sane() {
            return Err(CoreError::InvalidInput(format!(
                "candle at {} fails OHLC sanity",
                candle.timestamp
            ))
            .into());
        }
        let mut targets = Vec::new();
        for (index, tracked) in self.pending.iter().enumerate() {
            if tracked.signal.symbol != symbol || tracked.signal.timeframe != timeframe {
                continue;
            }
            let expected = tracked.expected_next();
            if candle.timestamp < expected {
                continue;
            }
            if candle.timestamp > expected {
                warn!(id = tracked.id, %expected, found = %candle.timestamp, "candle gap");
                return Err(TrackerError::Gap {
                    id: tracked.id,
                    expected,
                    found: candle.timestamp,
                });
            }
            targets.push(index);
        }

        for &index in &targets {
            let tracked = &mut self.pending[index];
            tracked.forward.push(candle);
            let outcome = self.simulator.simulate(
                &tracked.signal,
                &tracked.context,
                &tracked.forward,
                self.horizon,
            )?;
            tracked.outcome = Some(outcome);
        }

        let horizon = self.horizon;
        let (done, still_open): (Vec<TrackedSignal>, Vec<TrackedSignal>) =
            std::mem::take(&mut self.pending).into_iter().partition(|t| {
                t.outcome
                    .as_ref()
                    .is_some_and(|o| is_settled(o, t.forward.len(), horizon))
            });
        self.pending = still_open;

        let mut newly = Vec::with_capacity(done.len());
        for t in done {
            let Some(outcome) = t.outcome else { continue };
            info!(id = t.id, state = %outcome.state(), r = outcome.r_multiple, "signal resolved");
            newly.push(ResolvedSignal {
                id: t.id,
                signal: t.signal,
                outcome,
            });
        }
        self.resolved.extend(newly.iter().cloned());
        Ok(newly)
    }

    pub fn pending(&self) -> &[TrackedSignal] {
        &self.pending
    }

    pub fn resolved(&self) -> &[ResolvedSignal] {
        &self.resolved
    }

    /// Hand over resolved signals, clearing them from the tracker.
    pub fn drain_resolved(&mut self) -> Vec<ResolvedSignal> {
        std::mem::take(&mut self.resolved)
    }
}

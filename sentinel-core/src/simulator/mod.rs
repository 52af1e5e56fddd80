//! Trade Outcome Simulator.
//!
//! A signal starts OPEN and is walked candle by candle over its forward
//! window. Per candle, first match wins: the stop (LOSS), then the target
//! (WIN), with same-candle collisions resolved by `AmbiguityPolicy`. If the
//! horizon passes without a trigger the trade is force-closed at the final
//! close (TIME_EXIT). If the window ends before the horizon the trade stays
//! OPEN, which is how live tracking sees it.
//!
//! A stop exit is final only once the horizon has elapsed: loss tags read
//! the candles after the exit. `is_settled` tells a live caller when an
//! outcome can no longer change.
//!
//! Identical (signal, context, forward, horizon) inputs always produce an
//! identical `TradeOutcome`.

pub mod ambiguity;
pub mod loss_cause;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::{Candle, Direction, ExitReason, Signal, TradeOutcome, TradeResult};
use crate::error::{CoreError, Result};

pub use ambiguity::AmbiguityPolicy;
pub use loss_cause::classify_loss;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SimulatorConfig {
    pub ambiguity_policy: AmbiguityPolicy,
    /// Forward candles in a quick check.
    pub quick_bars: usize,
    /// Pre-trade candles inspected by the loss classifier.
    pub context_bars: usize,
    /// Entry-candle volatility above this tags VOLATILITY_STOP.
    pub volatility_stop_pct: f64,
    /// Pre-trade span below this tags RANGE_WHIPSAW.
    pub range_compression_pct: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            ambiguity_policy: AmbiguityPolicy::StopFirst,
            quick_bars: 5,
            context_bars: 5,
            volatility_stop_pct: 3.0,
            range_compression_pct: 2.0,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.quick_bars == 0 {
            return Err(CoreError::InvalidConfig("quick_bars must be >= 1".into()));
        }
        if !(self.volatility_stop_pct > 0.0) || !(self.range_compression_pct > 0.0) {
            return Err(CoreError::InvalidConfig(
                "loss classifier thresholds must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn quick_horizon(&self) -> Horizon {
        Horizon::Bars(self.quick_bars)
    }
}

/// How far forward a trade is followed before it is force-closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "bars", rename_all = "snake_case")]
pub enum Horizon {
    /// Force-close after this many candles.
    Bars(usize),
    /// Follow to the end of the supplied window.
    Full,
}

impl Horizon {
    /// Live tracking needs a fixed bar count; `Full` never elapses.
    pub fn validate_live(self) -> Result<usize> {
        match self {
            Horizon::Bars(0) => Err(CoreError::InvalidConfig(
                "horizon must cover at least one candle".into(),
            )),
            Horizon::Bars(n) => Ok(n),
            Horizon::Full => Err(CoreError::InvalidConfig(
                "a full-window horizon cannot be tracked live".into(),
            )),
        }
    }
}

/// Whether `outcome`, simulated over `seen` forward candles, is final.
///
/// Wins and time exits are final when they happen. A stop exit waits until
/// `horizon` candles have been seen so stop-hunt tagging sees the same
/// window a replay would. `Full` never settles a stop exit.
pub fn is_settled(outcome: &TradeOutcome, seen: usize, horizon: Horizon) -> bool {
    match outcome.exit_reason {
        None => false,
        Some(ExitReason::StopLossHit) => match horizon {
            Horizon::Bars(n) => seen >= n,
            Horizon::Full => false,
        },
        Some(_) => true,
    }
}

#[derive(Debug, Clone)]
pub struct TradeSimulator {
    config: SimulatorConfig,
}

impl TradeSimulator {
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Simulate `signal` over `forward`.
    ///
    /// `context` holds the candles up to and including the signal candle and
    /// is only read by the loss classifier. `forward` must start one interval
    /// after `signal.generated_at` and be contiguous.
    pub fn simulate(
        &self,
        signal: &Signal,
        context: &[Candle],
        forward: &[Candle],
        horizon: Horizon,
    ) -> Result<TradeOutcome> {
        validate_signal(signal)?;
        validate_window(signal, forward)?;

        let limit = match horizon {
            Horizon::Bars(0) => {
                return Err(CoreError::InvalidInput(
                    "horizon must cover at least one candle".into(),
                ));
            }
            Horizon::Bars(n) => n.min(forward.len()),
            Horizon::Full => forward.len(),
        };
        let window = &forward[..limit];

        for (i, candle) in window.iter().enumerate() {
            if let Some((result, exit_price, reason)) = self.evaluate_candle(signal, candle) {
                trace!(bar = i + 1, %reason, exit_price, "trade closed");
                return Ok(self.finish(signal, context, window, result, exit_price, reason, i + 1));
            }
        }

        let horizon_reached = match horizon {
            Horizon::Bars(n) => forward.len() >= n,
            Horizon::Full => !forward.is_empty(),
        };
        let Some(last) = window.last() else {
            return Ok(open_outcome(signal, signal.entry_price, 0));
        };
        if !horizon_reached {
            return Ok(open_outcome(signal, last.close, window.len()));
        }

        let favourable = (last.close - signal.entry_price) * signal.direction.sign() > 0.0;
        let result = if favourable { TradeResult::Win } else { TradeResult::Loss };
        Ok(self.finish(
            signal,
            context,
            window,
            result,
            last.close,
            ExitReason::TimeExit,
            window.len(),
        ))
    }

    fn evaluate_candle(
        &self,
        signal: &Signal,
        candle: &Candle,
    ) -> Option<(TradeResult, f64, ExitReason)> {
        let (stop_hit, target_hit) = match signal.direction {
            Direction::Long => (candle.low <= signal.stop_loss, candle.high >= signal.take_profit),
            Direction::Short => (candle.high >= signal.stop_loss, candle.low <= signal.take_profit),
            Direction::Hold => return None,
        };
        let stop = Some((TradeResult::Loss, signal.stop_loss, ExitReason::StopLossHit));
        let target = Some((TradeResult::Win, signal.take_profit, ExitReason::TakeProfitHit));
        match (stop_hit, target_hit) {
            (true, true) => {
                if self.config.ambiguity_policy.stop_wins(signal.direction, candle) {
                    stop
                } else {
                    target
                }
            }
            (true, false) => stop,
            (false, true) => target,
            (false, false) => None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        signal: &Signal,
        context: &[Candle],
        window: &[Candle],
        result: TradeResult,
        exit_price: f64,
        reason: ExitReason,
        bars_to_exit: usize,
    ) -> TradeOutcome {
        let loss_tags = if result == TradeResult::Loss {
            classify_loss(signal, context, window, reason, bars_to_exit, &self.config)
        } else {
            BTreeSet::new()
        };
        let (pnl_pct, r_multiple) = returns(signal, exit_price);
        TradeOutcome {
            entry_price: signal.entry_price,
            exit_price,
            result,
            exit_reason: Some(reason),
            bars_to_exit,
            loss_tags,
            pnl_pct,
            r_multiple,
        }
    }
}

fn open_outcome(signal: &Signal, mark: f64, bars: usize) -> TradeOutcome {
    let (pnl_pct, r_multiple) = returns(signal, mark);
    TradeOutcome {
        entry_price: signal.entry_price,
        exit_price: mark,
        result: TradeResult::Open,
        exit_reason: None,
        bars_to_exit: bars,
        loss_tags: BTreeSet::new(),
        pnl_pct,
        r_multiple,
    }
}

fn returns(signal: &Signal, exit_price: f64) -> (f64, f64) {
    let signed_move = (exit_price - signal.entry_price) * signal.direction.sign();
    let pnl_pct = signed_move / signal.entry_price * 100.0;
    let risk = signal.risk_per_unit();
    let r_multiple = if risk > 0.0 { signed_move / risk } else { 0.0 };
    (pnl_pct, r_multiple)
}

fn validate_signal(signal: &Signal) -> Result<()> {
    if !signal.direction.is_directional() {
        return Err(CoreError::InvalidInput("cannot simulate a HOLD signal".into()));
    }
    if !signal.levels_ordered() {
        return Err(CoreError::InvalidInput(format!(
            "{} levels out of order: stop {}, entry {}, target {}",
            signal.direction, signal.stop_loss, signal.entry_price, signal.take_profit
        )));
    }
    Ok(())
}

fn validate_window(signal: &Signal, forward: &[Candle]) -> Result<()> {
    let interval = signal.timeframe.interval();
    let mut expected = signal.generated_at + interval;
    for (index, candle) in forward.iter().enumerate() {
        if !candle.is_sane() {
            return Err(CoreError::InvalidInput(format!(
                "forward candle {index} at {} fails OHLC sanity",
                candle.timestamp
            )));
        }
        if candle.timestamp != expected {
            return Err(CoreError::NonContiguousWindow {
                index,
                detail: format!("expected candle at {expected}, found {}", candle.timestamp),
            });
        }
        expected = candle.timestamp + interval;
    }
    Ok(())
}

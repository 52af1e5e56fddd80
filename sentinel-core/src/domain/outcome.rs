//! Trade outcome produced by the simulator.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a finished (or still running) trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeResult {
    Win,
    Loss,
    Open,
}

/// Why the trade left the OPEN state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLossHit,
    TakeProfitHit,
    TimeExit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::StopLossHit => "Stop Loss Hit",
            ExitReason::TakeProfitHit => "Take Profit Hit",
            ExitReason::TimeExit => "Time Exit",
        })
    }
}

/// Simulator state. OPEN is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeState {
    Open,
    Win,
    Loss,
    TimeExit,
}

impl TradeState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TradeState::Open)
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradeState::Open => "OPEN",
            TradeState::Win => "WIN",
            TradeState::Loss => "LOSS",
            TradeState::TimeExit => "TIME_EXIT",
        })
    }
}

/// Post-hoc explanation of a losing trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LossTag {
    /// Entered against a move that kept going.
    TrendContinuation,
    /// Entry candle was already too wide for the stop.
    VolatilityStop,
    /// Pre-trade range was compressed; chop took the stop.
    RangeWhipsaw,
    /// Direction was right but the stop was too tight.
    StopHunt,
}

impl fmt::Display for LossTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LossTag::TrendContinuation => "TREND_CONTINUATION",
            LossTag::VolatilityStop => "VOLATILITY_STOP",
            LossTag::RangeWhipsaw => "RANGE_WHIPSAW",
            LossTag::StopHunt => "STOP_HUNT",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub entry_price: f64,
    /// Fill price for a closed trade, last observed close for an open one.
    pub exit_price: f64,
    pub result: TradeResult,
    pub exit_reason: Option<ExitReason>,
    /// Forward candles evaluated, 1-based.
    pub bars_to_exit: usize,
    pub loss_tags: BTreeSet<LossTag>,
    /// Signed return in percent, positive when the trade made money.
    pub pnl_pct: f64,
    /// Signed return in units of the initial stop distance.
    pub r_multiple: f64,
}

impl TradeOutcome {
    pub fn state(&self) -> TradeState {
        match (self.result, self.exit_reason) {
            (TradeResult::Open, _) => TradeState::Open,
            (_, Some(ExitReason::TimeExit)) => TradeState::TimeExit,
            (TradeResult::Win, _) => TradeState::Win,
            (TradeResult::Loss, _) => TradeState::Loss,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_win(&self) -> bool {
        self.result == TradeResult::Win
    }

    pub fn is_loss(&self) -> bool {
        self.result == TradeResult::Loss
    }
}

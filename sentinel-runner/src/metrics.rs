//! Backtest metrics computed from closed trade outcomes.
//!
//! Returns are measured in R-multiples (profit over initial risk) so results
//! are comparable across symbols and position sizes.

use std::collections::BTreeMap;

use sentinel_core::domain::{TradeOutcome, TradeState};
use serde::{Deserialize, Serialize};

/// Aggregate statistics for one replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Closed trades; open trades are counted separately.
    pub trade_count: usize,
    pub open_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub time_exits: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy_r: f64,
    pub total_r: f64,
    pub max_drawdown_r: f64,
    pub avg_bars_to_exit: f64,
    pub max_consecutive_losses: usize,
    /// Closed trades per exit reason ("Stop Loss Hit", ...).
    pub exit_reasons: BTreeMap<String, usize>,
    /// Losing trades per loss tag ("STOP_HUNT", ...).
    pub loss_tags: BTreeMap<String, usize>,
}

impl BacktestMetrics {
    /// Outcomes must be in trade order for the streak and drawdown metrics.
    pub fn compute(outcomes: &[TradeOutcome]) -> Self {
        let closed: Vec<&TradeOutcome> = outcomes.iter().filter(|o| o.is_closed()).collect();
        let mut exit_reasons = BTreeMap::new();
        let mut loss_tags = BTreeMap::new();
        for o in &closed {
            if let Some(reason) = o.exit_reason {
                *exit_reasons.entry(reason.to_string()).or_insert(0) += 1;
            }
            for tag in &o.loss_tags {
                *loss_tags.entry(tag.to_string()).or_insert(0) += 1;
            }
        }
        Self {
            trade_count: closed.len(),
            open_count: outcomes.len() - closed.len(),
            wins: closed.iter().filter(|o| o.is_win()).count(),
            losses: closed.iter().filter(|o| o.is_loss()).count(),
            time_exits: closed.iter().filter(|o| o.state() == TradeState::TimeExit).count(),
            win_rate: win_rate(&closed),
            profit_factor: profit_factor(&closed),
            expectancy_r: expectancy_r(&closed),
            total_r: closed.iter().map(|o| o.r_multiple).sum(),
            max_drawdown_r: max_drawdown_r(&closed),
            avg_bars_to_exit: avg_bars_to_exit(&closed),
            max_consecutive_losses: max_consecutive_losses(&closed),
            exit_reasons,
            loss_tags,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Fraction of closed trades that won.
pub fn win_rate(trades: &[&TradeOutcome]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_win()).count() as f64 / trades.len() as f64
}

/// Gross winning R over gross losing R.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[&TradeOutcome]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.r_multiple > 0.0)
        .map(|t| t.r_multiple)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.r_multiple < 0.0)
        .map(|t| t.r_multiple.abs())
        .sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Mean R per closed trade.
pub fn expectancy_r(trades: &[&TradeOutcome]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.r_multiple).sum::<f64>() / trades.len() as f64
}

/// Deepest peak-to-trough fall of the cumulative R curve.
pub fn max_drawdown_r(trades: &[&TradeOutcome]) -> f64 {
    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for t in trades {
        equity += t.r_multiple;
        peak = peak.max(equity);
        worst = worst.max(peak - equity);
    }
    worst
}

pub fn avg_bars_to_exit(trades: &[&TradeOutcome]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_to_exit as f64).sum::<f64>() / trades.len() as f64
}

pub fn max_consecutive_losses(trades: &[&TradeOutcome]) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for t in trades {
        if t.is_loss() {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

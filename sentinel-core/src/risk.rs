//! Risk Parameter Calculator: ATR-based stop/target placement and sizing.
//!
//! stop_distance = ATR × adjusted_multiplier, where the multiplier widens
//! in turbulent candles. The target sits `reward_multiple` stop distances
//! away on the other side of entry. Size is capped so that open plus new
//! notional never exceeds capital × max_leverage.

use serde::{Deserialize, Serialize};

use crate::domain::{Direction, Signal};
use crate::error::{CoreError, Result};

/// Highest confidence the scorer ever emits.
pub const MAX_CONFIDENCE: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    pub capital: f64,
    /// Fraction of capital put at risk per trade.
    pub max_risk_per_trade: f64,
    pub default_leverage: f64,
    pub max_leverage: f64,
    #[serde(default = "default_reward_multiple")]
    pub reward_multiple: f64,
    /// Scale the reward multiple from 2.0 to 3.0 with confidence.
    #[serde(default)]
    pub confidence_scaled_reward: bool,
    #[serde(default = "default_high_volatility_pct")]
    pub high_volatility_pct: f64,
    #[serde(default = "default_high_volatility_widening")]
    pub high_volatility_widening: f64,
}

fn default_reward_multiple() -> f64 {
    1.5
}

fn default_high_volatility_pct() -> f64 {
    8.0
}

fn default_high_volatility_widening() -> f64 {
    0.3
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.capital > 0.0) {
            return Err(CoreError::InvalidConfig("capital must be > 0".into()));
        }
        if !(self.max_risk_per_trade > 0.0 && self.max_risk_per_trade <= 1.0) {
            return Err(CoreError::InvalidConfig(
                "max_risk_per_trade must lie in (0, 1]".into(),
            ));
        }
        if !(self.max_leverage >= 1.0) || !(self.default_leverage >= 1.0) {
            return Err(CoreError::InvalidConfig("leverage must be >= 1".into()));
        }
        if !(self.reward_multiple > 0.0) {
            return Err(CoreError::InvalidConfig("reward_multiple must be > 0".into()));
        }
        if !(self.high_volatility_widening >= 0.0) {
            return Err(CoreError::InvalidConfig(
                "high_volatility_widening must be >= 0".into(),
            ));
        }
        Ok(())
    }

    /// Largest total notional the account may hold in one symbol.
    pub fn max_exposure(&self) -> f64 {
        self.capital * self.max_leverage
    }

    /// Configured leverage capped by `max_leverage`.
    pub fn effective_leverage(&self) -> f64 {
        self.default_leverage.min(self.max_leverage)
    }

    pub fn reward_multiple_for(&self, confidence: f64, min_confidence: f64) -> f64 {
        if !self.confidence_scaled_reward {
            return self.reward_multiple;
        }
        let span = MAX_CONFIDENCE - min_confidence;
        if span <= 0.0 {
            return 3.0;
        }
        (2.0 + (confidence - min_confidence) / span).clamp(2.0, 3.0)
    }
}

/// Inputs the calculator needs from a signal and its snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskRequest {
    pub direction: Direction,
    pub entry_price: f64,
    pub confidence: f64,
    pub atr: Option<f64>,
    pub volatility_pct: f64,
    /// Notional already held in the symbol, from the position ledger.
    pub open_notional: f64,
}

impl RiskRequest {
    pub fn for_signal(signal: &Signal, atr: Option<f64>, volatility_pct: f64) -> Self {
        Self {
            direction: signal.direction,
            entry_price: signal.entry_price,
            confidence: signal.confidence,
            atr,
            volatility_pct,
            open_notional: 0.0,
        }
    }

    pub fn with_open_notional(mut self, open_notional: f64) -> Self {
        self.open_notional = open_notional;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size: f64,
    pub leverage: f64,
    pub adjusted_multiplier: f64,
    pub stop_distance: f64,
    pub reward_multiple: f64,
    /// Capital allotted before leverage: capital × max_risk_per_trade.
    pub risk_amount: f64,
    pub notional: f64,
}

/// Compute stop, target and size. No parameters are emitted on failure.
pub fn compute_risk(
    request: &RiskRequest,
    atr_multiplier: f64,
    min_confidence: f64,
    config: &RiskConfig,
) -> Result<RiskParameters> {
    let entry = request.entry_price;
    if !(entry > 0.0) || !entry.is_finite() {
        return Err(CoreError::InvalidInput(format!("entry price must be positive, got {entry}")));
    }
    let sign = match request.direction {
        Direction::Long => 1.0,
        Direction::Short => -1.0,
        Direction::Hold => {
            return Err(CoreError::InvalidInput("cannot size a HOLD signal".into()));
        }
    };

    let atr = match request.atr {
        Some(atr) if atr.is_finite() => atr,
        Some(atr) => return Err(CoreError::IndeterminateRisk(format!("ATR not finite: {atr}"))),
        None => return Err(CoreError::IndeterminateRisk("ATR unavailable".into())),
    };
    if !request.volatility_pct.is_finite() {
        return Err(CoreError::IndeterminateRisk("volatility unavailable".into()));
    }

    let adjusted_multiplier = if request.volatility_pct > config.high_volatility_pct {
        atr_multiplier + config.high_volatility_widening
    } else {
        atr_multiplier
    };
    let stop_distance = atr * adjusted_multiplier;
    if !(stop_distance > 0.0) {
        return Err(CoreError::IndeterminateRisk(format!(
            "stop distance {stop_distance} is not positive"
        )));
    }

    let reward_multiple = config.reward_multiple_for(request.confidence, min_confidence);
    let stop_loss = entry - sign * stop_distance;
    let take_profit = entry + sign * stop_distance * reward_multiple;
    if !(stop_loss > 0.0) || !(take_profit > 0.0) {
        return Err(CoreError::IndeterminateRisk(format!(
            "levels cross zero: stop {stop_loss}, target {take_profit}"
        )));
    }

    if !(request.open_notional >= 0.0) || !request.open_notional.is_finite() {
        return Err(CoreError::InvalidInput(format!(
            "open notional must be finite and >= 0, got {}",
            request.open_notional
        )));
    }
    let headroom = config.max_exposure() - request.open_notional;
    if !(headroom > 0.0) {
        return Err(CoreError::IndeterminateRisk(format!(
            "open notional {:.2} leaves no room under exposure cap {:.2}",
            request.open_notional,
            config.max_exposure()
        )));
    }

    let leverage = config.effective_leverage();
    let risk_amount = config.capital * config.max_risk_per_trade;
    let notional = (risk_amount * leverage).min(headroom);

    Ok(RiskParameters {
        stop_loss,
        take_profit,
        position_size: notional / entry,
        leverage,
        adjusted_multiplier,
        stop_distance,
        reward_multiple,
        risk_amount,
        notional,
    })
}

//! Signal Sanity Validator.
//!
//! Scores a parsed signal against the live snapshot and the current
//! position. Every check contributes a weighted delta to a base score and
//! is reported as pass/warn/fail. The validator only produces a report and
//! a corrected order set; it never executes anything.

pub mod parser;

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Direction, Position};
use crate::error::{CoreError, Result};
use crate::regime::RegimeAssessment;
use crate::snapshot::IndicatorBundle;

pub use parser::{FomoMarkers, Intent, ParsedSignal, ParserConfig, SignalParser};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CheckWeights {
    pub missing_field: f64,
    pub entry_close: f64,
    pub entry_near: f64,
    pub entry_far: f64,
    pub add_without_position: f64,
    pub add_with_position: f64,
    pub risk_reward_good: f64,
    pub risk_reward_ok: f64,
    pub risk_reward_poor: f64,
    pub missing_stop: f64,
    pub aligned: f64,
    pub chasing: f64,
    pub regime_closed: f64,
    pub fomo: f64,
    pub weekend: f64,
}

impl Default for CheckWeights {
    fn default() -> Self {
        Self {
            missing_field: -25.0,
            entry_close: 20.0,
            entry_near: 10.0,
            entry_far: -20.0,
            add_without_position: -50.0,
            add_with_position: 20.0,
            risk_reward_good: 20.0,
            risk_reward_ok: 10.0,
            risk_reward_poor: -20.0,
            missing_stop: -10.0,
            aligned: 15.0,
            chasing: -10.0,
            regime_closed: -10.0,
            fomo: -15.0,
            weekend: -10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ValidatorConfig {
    pub parser: ParserConfig,
    pub base_score: f64,
    /// Entries within this distance of the live price are fully credited.
    pub close_entry_pct: f64,
    /// Entries beyond this distance fail and are snapped.
    pub entry_tolerance_pct: f64,
    /// Where a snapped entry is placed relative to the live price.
    pub snap_offset_pct: f64,
    pub min_risk_reward: f64,
    pub good_risk_reward: f64,
    /// Move beyond which a signal is buying strength / selling weakness.
    pub chase_threshold_pct: f64,
    pub fomo_threshold: usize,
    pub execution_floor: f64,
    pub doubtful_floor: f64,
    pub default_stop_pct: f64,
    pub default_target_pcts: Vec<f64>,
    /// Fraction of capital the corrected order set may commit.
    pub max_position_fraction: f64,
    pub weekend_check: bool,
    pub weights: CheckWeights,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            base_score: 50.0,
            close_entry_pct: 1.0,
            entry_tolerance_pct: 3.0,
            snap_offset_pct: 1.0,
            min_risk_reward: 1.5,
            good_risk_reward: 2.0,
            chase_threshold_pct: 5.0,
            fomo_threshold: 2,
            execution_floor: 50.0,
            doubtful_floor: 20.0,
            default_stop_pct: 3.0,
            default_target_pcts: vec![2.0, 3.0],
            max_position_fraction: 0.10,
            weekend_check: true,
            weights: CheckWeights::default(),
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.close_entry_pct && self.close_entry_pct <= self.entry_tolerance_pct) {
            return Err(CoreError::InvalidConfig(
                "close_entry_pct must lie in (0, entry_tolerance_pct]".into(),
            ));
        }
        if !(self.min_risk_reward > 0.0 && self.min_risk_reward <= self.good_risk_reward) {
            return Err(CoreError::InvalidConfig(
                "min_risk_reward must lie in (0, good_risk_reward]".into(),
            ));
        }
        if !(self.doubtful_floor <= self.execution_floor) {
            return Err(CoreError::InvalidConfig(
                "doubtful_floor must not exceed execution_floor".into(),
            ));
        }
        if !(self.default_stop_pct > 0.0) || self.default_target_pcts.iter().any(|t| !(*t > 0.0)) {
            return Err(CoreError::InvalidConfig(
                "default stop/target distances must be > 0".into(),
            ));
        }
        if self.default_target_pcts.is_empty() {
            return Err(CoreError::InvalidConfig("default_target_pcts must not be empty".into()));
        }
        if !(self.max_position_fraction > 0.0 && self.max_position_fraction <= 1.0) {
            return Err(CoreError::InvalidConfig("max_position_fraction must lie in (0, 1]".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Parse,
    EntryProximity,
    PositionIntent,
    RiskReward,
    RegimeAlignment,
    Fomo,
    Liquidity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub kind: CheckKind,
    pub status: CheckStatus,
    pub score_delta: f64,
    /// A hard failure blocks execution regardless of score.
    pub hard_fail: bool,
    pub message: String,
}

impl ValidationCheck {
    fn new(
        kind: CheckKind,
        status: CheckStatus,
        score_delta: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            status,
            score_delta,
            hard_fail: false,
            message: message.into(),
        }
    }

    fn hard(mut self) -> Self {
        self.hard_fail = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Valid,
    Doubtful,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    LimitBuy,
    LimitSell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub side: OrderSide,
    pub price: f64,
    /// Share of the order set's size placed at this price.
    pub fraction: f64,
    pub original_price: f64,
    pub snapped: bool,
}

/// The signal rewritten into orders that respect the live market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedOrderSet {
    pub symbol: Option<String>,
    pub direction: Direction,
    pub entries: Vec<OrderLeg>,
    pub stop_loss: f64,
    pub stop_defaulted: bool,
    pub targets: Vec<f64>,
    pub targets_defaulted: bool,
    pub max_position_fraction: f64,
    /// True only at or above the execution floor and with no hard failure.
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub parsed: ParsedSignal,
    pub live_price: f64,
    pub checks: Vec<ValidationCheck>,
    /// Validity in [0, 100].
    pub score: f64,
    pub recommendation: Recommendation,
    pub corrected: Option<CorrectedOrderSet>,
}

impl ValidationReport {
    pub fn has_hard_fail(&self) -> bool {
        self.checks.iter().any(|c| c.hard_fail)
    }

    pub fn checks_of(&self, kind: CheckKind) -> impl Iterator<Item = &ValidationCheck> {
        self.checks.iter().filter(move |c| c.kind == kind)
    }
}

#[derive(Debug, Clone)]
pub struct SignalValidator {
    config: ValidatorConfig,
    parser: SignalParser,
}

impl SignalValidator {
    pub fn new(config: ValidatorConfig) -> Result<Self> {
        config.validate()?;
        let parser = SignalParser::new(&config.parser)?;
        Ok(Self { config, parser })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn parser(&self) -> &SignalParser {
        &self.parser
    }

    /// Parse `text` and validate the result.
    pub fn validate_text(
        &self,
        text: &str,
        bundle: &IndicatorBundle,
        regime: Option<&RegimeAssessment>,
        position: Option<&Position>,
    ) -> ValidationReport {
        let parsed = self.parser.parse(text);
        self.validate(&parsed, bundle, regime, position)
    }

    pub fn validate(
        &self,
        parsed: &ParsedSignal,
        bundle: &IndicatorBundle,
        regime: Option<&RegimeAssessment>,
        position: Option<&Position>,
    ) -> ValidationReport {
        let w = &self.config.weights;
        let live = bundle.close;
        let position = position.filter(|p| p.is_open());
        let mut checks = Vec::new();

        let direction = parsed.direction.or_else(|| match (parsed.intent, position) {
            (Intent::AddToPosition, Some(p)) => Some(p.direction),
            _ => None,
        });

        if parsed.symbol.is_none() {
            checks.push(ValidationCheck::new(
                CheckKind::Parse,
                CheckStatus::Fail,
                w.missing_field,
                CoreError::MalformedSignalText("no symbol found".into()).to_string(),
            ));
        }
        match (parsed.direction, direction) {
            (None, Some(inherited)) => checks.push(ValidationCheck::new(
                CheckKind::Parse,
                CheckStatus::Warn,
                0.0,
                format!("direction {inherited} inherited from open position"),
            )),
            (None, None) => checks.push(ValidationCheck::new(
                CheckKind::Parse,
                CheckStatus::Fail,
                w.missing_field,
                CoreError::MalformedSignalText("no direction found".into()).to_string(),
            )),
            _ => {}
        }

        self.check_entries(parsed, live, &mut checks);
        self.check_intent(parsed, position, &mut checks);
        if let Some(direction) = direction {
            self.check_risk_reward(parsed, direction, &mut checks);
            self.check_alignment(direction, bundle, regime, &mut checks);
        }

        let fomo = parsed.fomo.total();
        checks.push(if fomo >= self.config.fomo_threshold {
            ValidationCheck::new(
                CheckKind::Fomo,
                CheckStatus::Warn,
                w.fomo,
                format!("{fomo} urgency markers, pressure language"),
            )
        } else {
            ValidationCheck::new(CheckKind::Fomo, CheckStatus::Pass, 0.0, "no pressure language")
        });

        if self.config.weekend_check && bundle.timestamp.weekday() == Weekday::Sun {
            checks.push(ValidationCheck::new(
                CheckKind::Liquidity,
                CheckStatus::Warn,
                w.weekend,
                "Sunday session, thin liquidity",
            ));
        }

        let deltas: f64 = checks.iter().map(|c| c.score_delta).sum();
        let score = (self.config.base_score + deltas).clamp(0.0, 100.0);
        let hard_failed = checks.iter().any(|c| c.hard_fail);
        let recommendation = if hard_failed || score < self.config.doubtful_floor {
            Recommendation::Reject
        } else if score < self.config.execution_floor {
            Recommendation::Doubtful
        } else {
            Recommendation::Valid
        };

        for c in checks.iter().filter(|c| c.status == CheckStatus::Fail) {
            debug!(
                kind = ?c.kind,
                delta = c.score_delta,
                message = %c.message,
                "validator check failed"
            );
        }

        let executable = score >= self.config.execution_floor && !hard_failed;
        let corrected = direction.map(|d| self.correct(parsed, d, live, executable));

        ValidationReport {
            parsed: parsed.clone(),
            live_price: live,
            checks,
            score,
            recommendation,
            corrected,
        }
    }

    fn check_entries(&self, parsed: &ParsedSignal, live: f64, checks: &mut Vec<ValidationCheck>) {
        let w = &self.config.weights;
        if parsed.entries.is_empty() {
            checks.push(ValidationCheck::new(
                CheckKind::EntryProximity,
                CheckStatus::Warn,
                0.0,
                "no entry price, live price assumed",
            ));
            return;
        }
        for &entry in &parsed.entries {
            let distance = (entry - live).abs() / live * 100.0;
            checks.push(if distance < self.config.close_entry_pct {
                ValidationCheck::new(
                    CheckKind::EntryProximity,
                    CheckStatus::Pass,
                    w.entry_close,
                    format!("entry {entry} is {distance:.2}% from live {live}"),
                )
            } else if distance < self.config.entry_tolerance_pct {
                ValidationCheck::new(
                    CheckKind::EntryProximity,
                    CheckStatus::Warn,
                    w.entry_near,
                    format!("entry {entry} is {distance:.2}% from live {live}"),
                )
            } else {
                ValidationCheck::new(
                    CheckKind::EntryProximity,
                    CheckStatus::Fail,
                    w.entry_far,
                    format!("entry {entry} is {distance:.2}% from live {live}, outside tolerance"),
                )
            });
        }
    }

    fn check_intent(
        &self,
        parsed: &ParsedSignal,
        position: Option<&Position>,
        checks: &mut Vec<ValidationCheck>,
    ) {
        if parsed.intent != Intent::AddToPosition {
            return;
        }
        let w = &self.config.weights;
        checks.push(match position {
            Some(p) => ValidationCheck::new(
                CheckKind::PositionIntent,
                CheckStatus::Pass,
                w.add_with_position,
                format!("adds to open {} position of {}", p.direction, p.size),
            ),
            None => ValidationCheck::new(
                CheckKind::PositionIntent,
                CheckStatus::Fail,
                w.add_without_position,
                "asks to add to a position that does not exist",
            )
            .hard(),
        });
    }

    fn check_risk_reward(
        &self,
        parsed: &ParsedSignal,
        direction: Direction,
        checks: &mut Vec<ValidationCheck>,
    ) {
        let w = &self.config.weights;
        let Some(stop) = parsed.stop_loss else {
            checks.push(ValidationCheck::new(
                CheckKind::RiskReward,
                CheckStatus::Warn,
                w.missing_stop,
                "no stop loss given",
            ));
            return;
        };
        let (Some(entry), Some(&target)) = (mean(&parsed.entries), parsed.targets.first()) else {
            checks.push(ValidationCheck::new(
                CheckKind::RiskReward,
                CheckStatus::Warn,
                0.0,
                "risk/reward not computable without entry and target",
            ));
            return;
        };
        let sign = direction.sign();
        let risk = (entry - stop) * sign;
        let reward = (target - entry) * sign;
        if !(risk > 0.0) || !(reward > 0.0) {
            checks.push(ValidationCheck::new(
                CheckKind::RiskReward,
                CheckStatus::Fail,
                w.risk_reward_poor,
                format!("stop {stop} or target {target} on the wrong side of entry {entry:.4}"),
            ));
            return;
        }
        let ratio = reward / risk;
        checks.push(if ratio >= self.config.good_risk_reward {
            ValidationCheck::new(
                CheckKind::RiskReward,
                CheckStatus::Pass,
                w.risk_reward_good,
                format!("R:R {ratio:.2}"),
            )
        } else if ratio >= self.config.min_risk_reward {
            ValidationCheck::new(
                CheckKind::RiskReward,
                CheckStatus::Warn,
                w.risk_reward_ok,
                format!("R:R {ratio:.2}"),
            )
        } else {
            ValidationCheck::new(
                CheckKind::RiskReward,
                CheckStatus::Fail,
                w.risk_reward_poor,
                format!("R:R {ratio:.2} below floor {:.2}", self.config.min_risk_reward),
            )
        });
    }

    fn check_alignment(
        &self,
        direction: Direction,
        bundle: &IndicatorBundle,
        regime: Option<&RegimeAssessment>,
        checks: &mut Vec<ValidationCheck>,
    ) {
        let w = &self.config.weights;
        let chase = self.config.chase_threshold_pct;
        let sign = direction.sign();
        let change = bundle.trailing_change_pct.or(bundle.change_pct);

        // Positive when the market already moved in the signal's direction.
        let run_up = change.map(|c| c * sign);
        let stretched = bundle.rsi.is_some_and(|rsi| match direction {
            Direction::Short => rsi > 70.0,
            _ => rsi < 30.0,
        });

        checks.push(match run_up {
            Some(r) if r > chase => ValidationCheck::new(
                CheckKind::RegimeAlignment,
                CheckStatus::Warn,
                w.chasing,
                format!("chasing a {:.1}% move in the signal's direction", r),
            ),
            Some(r) if r < -chase || stretched => ValidationCheck::new(
                CheckKind::RegimeAlignment,
                CheckStatus::Pass,
                w.aligned,
                format!("{direction} against a stretched {:.1}% move", -r),
            ),
            None if stretched => ValidationCheck::new(
                CheckKind::RegimeAlignment,
                CheckStatus::Pass,
                w.aligned,
                format!("{direction} at a stretched RSI"),
            ),
            _ => ValidationCheck::new(
                CheckKind::RegimeAlignment,
                CheckStatus::Pass,
                0.0,
                "neutral backdrop",
            ),
        });

        if let Some(regime) = regime.filter(|r| !r.can_trade) {
            checks.push(ValidationCheck::new(
                CheckKind::RegimeAlignment,
                CheckStatus::Warn,
                w.regime_closed,
                format!("regime {} closed for trading: {}", regime.label, regime.reason),
            ));
        }
    }

    fn correct(
        &self,
        parsed: &ParsedSignal,
        direction: Direction,
        live: f64,
        executable: bool,
    ) -> CorrectedOrderSet {
        let c = &self.config;
        let sign = direction.sign();
        let side = if direction == Direction::Short {
            OrderSide::LimitSell
        } else {
            OrderSide::LimitBuy
        };

        let raw_entries = if parsed.entries.is_empty() {
            vec![live]
        } else {
            parsed.entries.clone()
        };
        let fraction = 1.0 / raw_entries.len() as f64;
        let entries: Vec<OrderLeg> = raw_entries
            .iter()
            .map(|&original| {
                let distance = (original - live).abs() / live * 100.0;
                let (price, snapped) = if distance > c.entry_tolerance_pct {
                    let offset = if original > live {
                        c.snap_offset_pct
                    } else {
                        -c.snap_offset_pct
                    };
                    (live * (1.0 + offset / 100.0), true)
                } else {
                    (original, false)
                };
                OrderLeg {
                    side,
                    price,
                    fraction,
                    original_price: original,
                    snapped,
                }
            })
            .collect();

        let avg_entry = entries.iter().map(|l| l.price * l.fraction).sum::<f64>();
        let (stop_loss, stop_defaulted) = match parsed.stop_loss {
            Some(stop) if (avg_entry - stop) * sign > 0.0 => (stop, false),
            _ => (live * (1.0 - sign * c.default_stop_pct / 100.0), true),
        };
        let parsed_targets: Vec<f64> = parsed
            .targets
            .iter()
            .copied()
            .filter(|t| (t - avg_entry) * sign > 0.0)
            .collect();
        let (targets, targets_defaulted) = if parsed_targets.is_empty() {
            let defaults = c
                .default_target_pcts
                .iter()
                .map(|pct| live * (1.0 + sign * pct / 100.0))
                .collect();
            (defaults, true)
        } else {
            (parsed_targets, false)
        };

        CorrectedOrderSet {
            symbol: parsed.symbol.clone(),
            direction,
            entries,
            stop_loss,
            stop_defaulted,
            targets,
            targets_defaulted,
            max_position_fraction: c.max_position_fraction,
            executable,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

//! Aggregate configuration for every core component.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Timeframe;
use crate::error::{CoreError, Result};
use crate::regime::RegimeConfig;
use crate::risk::RiskConfig;
use crate::scoring::{SignalScorer, TimeframeConfig};
use crate::simulator::SimulatorConfig;
use crate::snapshot::SnapshotConfig;
use crate::validator::ValidatorConfig;

const BALANCED_PRESET: &str = include_str!("../presets/balanced.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub regime: RegimeConfig,
    pub risk: RiskConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    /// Scoring thresholds keyed by timeframe. There are no built-in
    /// defaults; a timeframe missing here cannot be scored.
    pub timeframes: BTreeMap<Timeframe, TimeframeConfig>,
}

impl SystemConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SystemConfig =
            toml::from_str(source).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize from an already-parsed TOML value (e.g. after a host
    /// stripped its own tables).
    pub fn from_toml_value(value: toml::Value) -> Result<Self> {
        let config: SystemConfig = value
            .try_into()
            .map_err(|e: toml::de::Error| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The shipped balanced preset covering 15m, 1h and 4h.
    pub fn balanced_preset() -> Result<Self> {
        Self::from_toml_str(BALANCED_PRESET)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| CoreError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.snapshot.validate()?;
        self.regime.validate()?;
        self.risk.validate()?;
        self.simulator.validate()?;
        self.validator.validate()?;
        if self.timeframes.is_empty() {
            return Err(CoreError::InvalidConfig("at least one timeframe table is required".into()));
        }
        for (tf, cfg) in &self.timeframes {
            cfg.validate()
                .map_err(|e| CoreError::InvalidConfig(format!("timeframes.{tf}: {e}")))?;
        }
        Ok(())
    }

    pub fn timeframe(&self, tf: Timeframe) -> Result<&TimeframeConfig> {
        self.timeframes.get(&tf).ok_or_else(|| {
            CoreError::InvalidConfig(format!("no thresholds configured for timeframe {tf}"))
        })
    }

    pub fn scorer(&self, tf: Timeframe) -> Result<SignalScorer> {
        SignalScorer::new(tf, self.timeframe(tf)?.clone(), self.risk.clone())
    }
}

//! Runner configuration file.
//!
//! One TOML document carries the core `SystemConfig` tables plus the
//! runner-only `[council]` and `[backtest]` tables.

use std::path::Path;

use anyhow::{Context, Result};
use sentinel_core::SystemConfig;
use serde::de::DeserializeOwned;

use crate::backtest::BacktestConfig;
use crate::council::CouncilConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub system: SystemConfig,
    pub council: CouncilConfig,
    pub backtest: BacktestConfig,
}

impl RunnerConfig {
    /// Balanced preset with default council and backtest settings.
    pub fn balanced() -> Result<Self> {
        Ok(Self {
            system: SystemConfig::balanced_preset().context("balanced preset failed to load")?,
            council: CouncilConfig::default(),
            backtest: BacktestConfig::default(),
        })
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let mut table: toml::Table = source.parse().context("config is not valid TOML")?;
        let council = take_table::<CouncilConfig>(&mut table, "council")?;
        let backtest = take_table::<BacktestConfig>(&mut table, "backtest")?;
        let system = SystemConfig::from_toml_value(toml::Value::Table(table))
            .context("invalid system config")?;

        council.validate().context("invalid [council] table")?;
        backtest.validate().context("invalid [backtest] table")?;
        Ok(Self {
            system,
            council,
            backtest,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("failed to load config from {}", path.display()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let system =
            toml::Value::try_from(&self.system).context("failed to serialize system config")?;
        let mut table = match system {
            toml::Value::Table(t) => t,
            other => anyhow::bail!(
                "system config serialized to {} instead of a table",
                other.type_str()
            ),
        };
        table.insert("council".into(), toml::Value::try_from(&self.council)?);
        table.insert("backtest".into(), toml::Value::try_from(&self.backtest)?);
        Ok(toml::to_string(&table)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Remove `key` from the document and deserialize it, defaulting when absent.
fn take_table<T: DeserializeOwned + Default>(table: &mut toml::Table, key: &str) -> Result<T> {
    match table.remove(key) {
        Some(value) => value.try_into().with_context(|| format!("invalid [{key}] table")),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::simulator::Horizon;

    #[test]
    fn runner_tables_are_split_off() {
        let mut source = RunnerConfig::balanced().unwrap().system.to_toml_string().unwrap();
        source.push_str(
            r#"
[council]
parallel = false

[backtest]
horizon = { type = "bars", bars = 10 }
history_bars = 120
"#,
        );
        let config = RunnerConfig::from_toml_str(&source).unwrap();
        assert!(!config.council.parallel);
        assert_eq!(config.backtest.horizon, Horizon::Bars(10));
        assert_eq!(config.backtest.history_bars, 120);
        assert!(config.backtest.one_position_at_a_time);
    }

    #[test]
    fn unknown_runner_keys_are_rejected() {
        let mut source = RunnerConfig::balanced().unwrap().system.to_toml_string().unwrap();
        source.push_str("\n[backtest]\nhorizon_bars = 10\n");
        let err = RunnerConfig::from_toml_str(&source).unwrap_err();
        assert!(format!("{err:#}").contains("[backtest]"));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = RunnerConfig::balanced().unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(RunnerConfig::from_toml_str(&text).unwrap(), config);
    }
}

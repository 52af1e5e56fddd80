//! Market Snapshot Builder: candles + optional order book → indicator bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Candle, OrderBookSnapshot};
use crate::error::{CoreError, Result};
use crate::indicators::{
    Atr, Ema, Indicator, OrderFlow, OrderFlowConfig, RateOfChange, Rsi, VolumeRatio, WhaleSide,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SnapshotConfig {
    pub rsi_period: usize,
    pub atr_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub volume_window: usize,
    /// Horizon of `trailing_change_pct`, in candles.
    pub trailing_change_bars: usize,
    pub order_flow: OrderFlowConfig,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            atr_period: 14,
            ema_fast: 20,
            ema_slow: 50,
            volume_window: 20,
            trailing_change_bars: 24,
            order_flow: OrderFlowConfig::default(),
        }
    }
}

impl SnapshotConfig {
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("atr_period", self.atr_period),
            ("ema_fast", self.ema_fast),
            ("ema_slow", self.ema_slow),
            ("volume_window", self.volume_window),
            ("trailing_change_bars", self.trailing_change_bars),
            ("order_flow.depth_levels", self.order_flow.depth_levels),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, v)| *v == 0) {
            return Err(CoreError::InvalidConfig(format!("{name} must be >= 1")));
        }
        if self.ema_fast >= self.ema_slow {
            return Err(CoreError::InvalidConfig(format!(
                "ema_fast ({}) must be shorter than ema_slow ({})",
                self.ema_fast, self.ema_slow
            )));
        }
        if !(self.order_flow.price_band_pct > 0.0) {
            return Err(CoreError::InvalidConfig("order_flow.price_band_pct must be > 0".into()));
        }
        if !(self.order_flow.whale_threshold_usd > 0.0) {
            return Err(CoreError::InvalidConfig(
                "order_flow.whale_threshold_usd must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Indicator values attached to the latest candle.
///
/// Every field that needs more history than was supplied is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub range_position: f64,
    pub volatility_pct: f64,
    /// Close-to-close change of the latest candle, in percent.
    pub change_pct: Option<f64>,
    pub trailing_change_pct: Option<f64>,
    pub order_book_imbalance: Option<f64>,
    /// Absent when no order book was supplied.
    pub whale_activity: Option<bool>,
    pub whale_side: Option<WhaleSide>,
}

impl IndicatorBundle {
    /// |ema_fast - ema_slow| as a percentage of the close.
    pub fn trend_strength_pct(&self) -> Option<f64> {
        let (fast, slow) = (self.ema_fast?, self.ema_slow?);
        Some((fast - slow).abs() / self.close * 100.0)
    }

    pub fn is_uptrend(&self) -> Option<bool> {
        Some(self.ema_fast? > self.ema_slow?)
    }
}

/// Builds indicator bundles with a fixed set of indicator instances.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    config: SnapshotConfig,
    rsi: Rsi,
    atr: Atr,
    ema_fast: Ema,
    ema_slow: Ema,
    volume_ratio: VolumeRatio,
    change: RateOfChange,
    trailing_change: RateOfChange,
}

impl SnapshotBuilder {
    pub fn new(config: SnapshotConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rsi: Rsi::new(config.rsi_period),
            atr: Atr::new(config.atr_period),
            ema_fast: Ema::new(config.ema_fast),
            ema_slow: Ema::new(config.ema_slow),
            volume_ratio: VolumeRatio::new(config.volume_window),
            change: RateOfChange::new(1),
            trailing_change: RateOfChange::new(config.trailing_change_bars),
            config,
        })
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Fewest candles for which a bundle is built at all: the smallest
    /// requirement among the lookback indicators.
    pub fn min_history(&self) -> usize {
        [
            self.rsi.min_candles(),
            self.atr.min_candles(),
            self.ema_fast.min_candles(),
            self.volume_ratio.min_candles(),
        ]
        .into_iter()
        .min()
        .unwrap_or(1)
    }

    /// Candles needed for every lookback field to be present.
    pub fn full_history(&self) -> usize {
        [
            self.rsi.min_candles(),
            self.atr.min_candles(),
            self.ema_slow.min_candles(),
            self.volume_ratio.min_candles(),
            self.trailing_change.min_candles(),
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
    }

    pub fn build(
        &self,
        candles: &[Candle],
        book: Option<&OrderBookSnapshot>,
    ) -> Result<IndicatorBundle> {
        let required = self.min_history();
        if candles.len() < required {
            return Err(CoreError::InsufficientHistory {
                required,
                available: candles.len(),
            });
        }
        if let Some(i) = candles.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(CoreError::InvalidInput(format!(
                "candles out of chronological order at index {}",
                i + 1
            )));
        }
        let Some(latest) = candles.last() else {
            return Err(CoreError::InsufficientHistory { required, available: 0 });
        };
        if !latest.is_sane() {
            return Err(CoreError::InvalidInput(format!(
                "latest candle at {} fails OHLC sanity",
                latest.timestamp
            )));
        }

        let flow = book.map(|b| OrderFlow::analyze(b, &self.config.order_flow));

        let bundle = IndicatorBundle {
            timestamp: latest.timestamp,
            close: latest.close,
            rsi: self.rsi.latest(candles),
            atr: self.atr.latest(candles),
            ema_fast: self.ema_fast.latest(candles),
            ema_slow: self.ema_slow.latest(candles),
            volume_ratio: self.volume_ratio.latest(candles),
            range_position: latest.range_position(),
            volatility_pct: latest.volatility_pct(),
            change_pct: self.change.latest(candles),
            trailing_change_pct: self.trailing_change.latest(candles),
            order_book_imbalance: flow.as_ref().and_then(|f| f.imbalance),
            whale_activity: flow.as_ref().map(|f| f.whale_activity),
            whale_side: flow.as_ref().and_then(|f| f.whale_side),
        };

        if candles.len() < self.full_history() {
            debug!(
                available = candles.len(),
                full = self.full_history(),
                "partial snapshot, some indicator fields absent"
            );
        }

        Ok(bundle)
    }
}

/// Closes of the last `n` candles, oldest first.
pub fn recent_closes(candles: &[Candle], n: usize) -> Vec<f64> {
    let start = candles.len().saturating_sub(n);
    candles[start..].iter().map(|c| c.close).collect()
}

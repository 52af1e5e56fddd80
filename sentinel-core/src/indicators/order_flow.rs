//! Order-book flow: bid/ask notional imbalance and whale detection.

use serde::{Deserialize, Serialize};

use crate::domain::{BookLevel, OrderBookSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OrderFlowConfig {
    /// Levels considered per side, best first.
    pub depth_levels: usize,
    /// Only levels within this percentage of the mid price count.
    pub price_band_pct: f64,
    /// A single level above this notional is a whale.
    pub whale_threshold_usd: f64,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            depth_levels: 20,
            price_band_pct: 2.0,
            whale_threshold_usd: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhaleSide {
    Bid,
    Ask,
    Both,
}

/// Order-flow reading of one book snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFlow {
    /// (bid notional - ask notional) / total, in [-1, 1].
    pub imbalance: Option<f64>,
    pub whale_activity: bool,
    pub whale_side: Option<WhaleSide>,
    pub largest_bid_notional: f64,
    pub largest_ask_notional: f64,
}

impl OrderFlow {
    pub fn analyze(book: &OrderBookSnapshot, config: &OrderFlowConfig) -> Self {
        let mid = book.mid_price();
        let in_band = |level: &BookLevel| match mid {
            Some(mid) => ((level.price - mid).abs() / mid * 100.0) <= config.price_band_pct,
            None => true,
        };

        let bids: Vec<BookLevel> = book
            .sorted_bids()
            .into_iter()
            .take(config.depth_levels)
            .filter(in_band)
            .collect();
        let asks: Vec<BookLevel> = book
            .sorted_asks()
            .into_iter()
            .take(config.depth_levels)
            .filter(in_band)
            .collect();

        let bid_notional: f64 = bids.iter().map(BookLevel::notional).sum();
        let ask_notional: f64 = asks.iter().map(BookLevel::notional).sum();
        let total = bid_notional + ask_notional;

        let imbalance = if mid.is_some() && bid_notional > 0.0 && ask_notional > 0.0 {
            Some(((bid_notional - ask_notional) / total).clamp(-1.0, 1.0))
        } else {
            None
        };

        let largest = |levels: &[BookLevel]| {
            levels
                .iter()
                .map(BookLevel::notional)
                .fold(0.0, f64::max)
        };
        let largest_bid_notional = largest(&bids);
        let largest_ask_notional = largest(&asks);

        let bid_whale = largest_bid_notional > config.whale_threshold_usd;
        let ask_whale = largest_ask_notional > config.whale_threshold_usd;
        let whale_side = match (bid_whale, ask_whale) {
            (true, true) => Some(WhaleSide::Both),
            (true, false) => Some(WhaleSide::Bid),
            (false, true) => Some(WhaleSide::Ask),
            (false, false) => None,
        };

        Self {
            imbalance,
            whale_activity: whale_side.is_some(),
            whale_side,
            largest_bid_notional,
            largest_ask_notional,
        }
    }
}

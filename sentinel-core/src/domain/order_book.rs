//! Order-book snapshot as delivered by a market data provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One price level: price and resting size in base units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

impl BookLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }

    /// Quote-currency value resting at this level.
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }

    fn is_valid(&self) -> bool {
        self.price.is_finite() && self.size.is_finite() && self.price > 0.0 && self.size > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl OrderBookSnapshot {
    pub fn new(bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        Self {
            bids,
            asks,
            timestamp: None,
        }
    }

    /// Bids sorted best (highest) first, invalid levels dropped.
    pub fn sorted_bids(&self) -> Vec<BookLevel> {
        let mut bids: Vec<BookLevel> = self
            .bids
            .iter()
            .copied()
            .filter(BookLevel::is_valid)
            .collect();
        bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        bids
    }

    /// Asks sorted best (lowest) first, invalid levels dropped.
    pub fn sorted_asks(&self) -> Vec<BookLevel> {
        let mut asks: Vec<BookLevel> = self
            .asks
            .iter()
            .copied()
            .filter(BookLevel::is_valid)
            .collect();
        asks.sort_by(|a, b| a.price.total_cmp(&b.price));
        asks
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.sorted_bids().first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.sorted_asks().first().map(|l| l.price)
    }

    /// Mid of the best bid and ask. Absent for a one-sided or empty book.
    pub fn mid_price(&self) -> Option<f64> {
        Some((self.best_bid()? + self.best_ask()?) / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_and_mids() {
        let book = OrderBookSnapshot::new(
            vec![BookLevel::new(99.0, 1.0), BookLevel::new(99.5, 2.0)],
            vec![BookLevel::new(101.0, 1.0), BookLevel::new(100.5, 1.0)],
        );
        assert_eq!(book.best_bid(), Some(99.5));
        assert_eq!(book.best_ask(), Some(100.5));
        assert_eq!(book.mid_price(), Some(100.0));
    }

    #[test]
    fn one_sided_book_has_no_mid() {
        let book = OrderBookSnapshot::new(vec![BookLevel::new(99.0, 1.0)], vec![]);
        assert_eq!(book.mid_price(), None);
    }

    #[test]
    fn invalid_levels_are_ignored() {
        let book = OrderBookSnapshot::new(
            vec![BookLevel::new(f64::NAN, 1.0), BookLevel::new(99.0, 0.0)],
            vec![BookLevel::new(101.0, 3.0)],
        );
        assert!(book.sorted_bids().is_empty());
        assert_eq!(book.sorted_asks().len(), 1);
    }
}

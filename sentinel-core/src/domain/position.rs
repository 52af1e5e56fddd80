//! Externally owned position snapshot.

use serde::{Deserialize, Serialize};

use super::signal::Direction;

/// Read-only view of an open position held by an external ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub size: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

impl Position {
    /// A position counts only when it has a direction and non-zero size.
    pub fn is_open(&self) -> bool {
        self.direction.is_directional() && self.size.abs() > 0.0
    }

    /// Exposure at entry, in quote currency.
    pub fn notional(&self) -> f64 {
        self.size.abs() * self.entry_price
    }

    /// Unrealised return in percent at `price`.
    pub fn unrealized_pct(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price * 100.0 * self.direction.sign()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_is_not_open() {
        let p = Position {
            symbol: "SOLUSDT".into(),
            direction: Direction::Long,
            entry_price: 190.0,
            size: 0.0,
            stop_loss: None,
            take_profit: None,
        };
        assert!(!p.is_open());
    }

    #[test]
    fn short_profit_is_positive_when_price_falls() {
        let p = Position {
            symbol: "SOLUSDT".into(),
            direction: Direction::Short,
            entry_price: 200.0,
            size: 1.5,
            stop_loss: Some(206.0),
            take_profit: None,
        };
        assert!(p.is_open());
        assert!((p.unrealized_pct(190.0) - 5.0).abs() < 1e-12);
        assert!((p.notional() - 300.0).abs() < 1e-12);
    }
}

//! Market data and position collaborators.
//!
//! The core never fetches anything; hosts supply candles, order books and
//! positions through these traits. In-memory implementations back tests and
//! replays, and CSV loading feeds the in-memory provider from files.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use sentinel_core::domain::{Candle, OrderBookSnapshot, Position, Timeframe};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Errors from the data collaborators.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no candles for '{symbol}' on {timeframe}")]
    UnknownSeries { symbol: String, timeframe: Timeframe },

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("candles out of order at row {row}: {detail}")]
    OutOfOrder { row: usize, detail: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub trait MarketDataProvider: Send + Sync {
    /// The most recent `limit` candles, oldest first.
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, LoadError>;

    /// Top `depth` levels per side, or `None` when no book is available.
    fn get_order_book(
        &self,
        symbol: &str,
        depth: usize,
    ) -> Result<Option<OrderBookSnapshot>, LoadError>;
}

pub trait PositionLedger: Send + Sync {
    fn get_open_position(&self, symbol: &str) -> Option<Position>;
}

// ─── In-memory implementations ──────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryProvider {
    candles: HashMap<(String, Timeframe), Vec<Candle>>,
    books: HashMap<String, OrderBookSnapshot>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_candles(&mut self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        self.candles.insert((symbol.to_string(), timeframe), candles);
    }

    pub fn insert_order_book(&mut self, symbol: &str, book: OrderBookSnapshot) {
        self.books.insert(symbol.to_string(), book);
    }
}

impl MarketDataProvider for InMemoryProvider {
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, LoadError> {
        let series = self
            .candles
            .get(&(symbol.to_string(), timeframe))
            .ok_or_else(|| LoadError::UnknownSeries {
                symbol: symbol.to_string(),
                timeframe,
            })?;
        let start = series.len().saturating_sub(limit);
        Ok(series[start..].to_vec())
    }

    fn get_order_book(
        &self,
        symbol: &str,
        depth: usize,
    ) -> Result<Option<OrderBookSnapshot>, LoadError> {
        Ok(self.books.get(symbol).map(|book| {
            let mut bids = book.sorted_bids();
            let mut asks = book.sorted_asks();
            bids.truncate(depth);
            asks.truncate(depth);
            OrderBookSnapshot {
                bids,
                asks,
                timestamp: book.timestamp,
            }
        }))
    }
}

/// Positions keyed by symbol, updated by the host.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    positions: RwLock<HashMap<String, Position>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, position: Position) {
        self.write().insert(position.symbol.clone(), position);
    }

    pub fn close(&self, symbol: &str) -> Option<Position> {
        self.write().remove(symbol)
    }

    /// A panicked writer leaves whole entries behind, so the map is still usable.
    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Position>> {
        self.positions.write().unwrap_or_else(|poisoned| {
            warn!("position ledger lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl PositionLedger for InMemoryLedger {
    fn get_open_position(&self, symbol: &str) -> Option<Position> {
        let map = self.positions.read().unwrap_or_else(|poisoned| {
            warn!(symbol, "position ledger lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        });
        map.get(symbol).filter(|p| p.is_open()).cloned()
    }
}

// ─── CSV loading ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Accepts RFC 3339 or integer epoch milliseconds (exchange kline style).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = raw.parse().ok()?;
        return Utc.timestamp_millis_opt(millis).single();
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}

/// Parse `timestamp,open,high,low,close,volume` rows.
///
/// Rows must be strictly chronological and OHLC-sane.
pub fn parse_candles_csv<R: Read>(reader: R) -> Result<Vec<Candle>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles: Vec<Candle> = Vec::new();
    for (i, row) in rdr.deserialize::<CandleRow>().enumerate() {
        let row_no = i + 1;
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::InvalidRow {
            row: row_no,
            reason: format!("unparseable timestamp '{}'", row.timestamp),
        })?;
        let candle = Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !candle.is_sane() {
            return Err(LoadError::InvalidRow {
                row: row_no,
                reason: "OHLC values are not consistent".into(),
            });
        }
        if let Some(prev) = candles.last() {
            if candle.timestamp <= prev.timestamp {
                return Err(LoadError::OutOfOrder {
                    row: row_no,
                    detail: format!("{} follows {}", candle.timestamp, prev.timestamp),
                });
            }
        }
        candles.push(candle);
    }
    Ok(candles)
}

pub fn load_candles_csv(path: &Path) -> anyhow::Result<Vec<Candle>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    parse_candles_csv(file)
        .with_context(|| format!("failed to load candles from {}", path.display()))
}

//! Integration tests: providers, config files and the evaluation pipeline.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sentinel_core::domain::{BookLevel, Candle, Direction, OrderBookSnapshot, Position, Timeframe};
use sentinel_core::scoring::{FilterStep, ScoreDecision};
use sentinel_core::simulator::Horizon;
use sentinel_runner::{
    load_candles_csv, Council, CouncilConfig, InMemoryLedger, InMemoryProvider, MarketDataProvider,
    Pipeline, PositionLedger, RunnerConfig,
};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap()
}

/// 80 quiet hourly candles then a high-volume flush.
fn flush_series() -> Vec<Candle> {
    let mut candles: Vec<Candle> = (0..80)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.7).sin() * 0.4;
            Candle {
                timestamp: t0() + TimeDelta::hours(i),
                open: close + 0.1,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1_000.0,
            }
        })
        .collect();
    let prev = candles[79].close;
    candles.push(Candle {
        timestamp: t0() + TimeDelta::hours(80),
        open: prev,
        high: prev + 0.2,
        low: prev * 0.95,
        close: prev * 0.955,
        volume: 4_000.0,
    });
    candles
}

fn book(mid: f64) -> OrderBookSnapshot {
    OrderBookSnapshot::new(
        vec![BookLevel::new(mid - 0.1, 40.0), BookLevel::new(mid - 0.2, 30.0)],
        vec![BookLevel::new(mid + 0.1, 10.0), BookLevel::new(mid + 0.2, 10.0)],
    )
}

// ──────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────

#[test]
fn flush_through_provider_emits_long_with_consensus() {
    let candles = flush_series();
    let mid = candles[candles.len() - 1].close;
    let mut provider = InMemoryProvider::new();
    provider.insert_candles("ETHUSDT", Timeframe::H1, candles);
    provider.insert_order_book("ETHUSDT", book(mid));

    let config = RunnerConfig::balanced().unwrap();
    let pipeline = Pipeline::from_config(&config.system)
        .unwrap()
        .with_council(Council::standard(CouncilConfig::default()).unwrap());

    let eval = pipeline.evaluate_from(&provider, "ETHUSDT", Timeframe::H1).unwrap();

    assert_eq!(eval.decision.direction(), Direction::Long);
    let ScoreDecision::Signal(scored) = &eval.decision else {
        panic!("expected a signal, got {:?}", eval.decision.trace());
    };
    assert!(scored.signal.levels_ordered());
    assert!(eval.bundle.order_book_imbalance.is_some_and(|i| i > 0.0));

    let consensus = eval.consensus.expect("council attached");
    assert_eq!(consensus.opinions.len(), 6);
    assert!(consensus.opinions.iter().all(|o| o.recommendation.is_some()));
}

#[test]
fn quiet_market_holds_without_council() {
    let candles: Vec<Candle> = flush_series()[..80].to_vec();
    let pipeline = Pipeline::from_config(&RunnerConfig::balanced().unwrap().system).unwrap();

    let eval = pipeline.evaluate("ETHUSDT", Timeframe::H1, &candles, None).unwrap();

    assert_eq!(eval.decision.signal(), None);
    assert!(eval.consensus.is_none());
    assert!(!eval.decision.trace().is_empty());
}

#[test]
fn unknown_series_surfaces_load_error() {
    let provider = InMemoryProvider::new();
    let pipeline = Pipeline::from_config(&RunnerConfig::balanced().unwrap().system).unwrap();
    let err = pipeline.evaluate_from(&provider, "NOPE", Timeframe::H1).unwrap_err();
    assert!(err.to_string().contains("NOPE"));
}

// ──────────────────────────────────────────────
// Ledger feeding the validator
// ──────────────────────────────────────────────

#[test]
fn ledger_position_unlocks_add_intent() {
    let candles = flush_series();
    let pipeline = Pipeline::from_config(&RunnerConfig::balanced().unwrap().system).unwrap();
    let eval = pipeline.evaluate("SOLUSDT", Timeframe::H1, &candles, None).unwrap();
    let price = eval.bundle.close;

    let ledger = InMemoryLedger::new();
    let validator = sentinel_core::validator::SignalValidator::new(Default::default()).unwrap();
    let text = format!("increase position at ${price:.2}");

    let held = ledger.get_open_position("SOLUSDT");
    let without = validator.validate_text(&text, &eval.bundle, Some(&eval.regime), held.as_ref());
    assert!(without.has_hard_fail());
    assert!(without.corrected.is_none());

    ledger.open(Position {
        symbol: "SOLUSDT".into(),
        direction: Direction::Long,
        entry_price: price * 1.05,
        size: 3.0,
        stop_loss: None,
        take_profit: None,
    });
    let held = ledger.get_open_position("SOLUSDT");
    let with = validator.validate_text(&text, &eval.bundle, Some(&eval.regime), held.as_ref());
    assert!(!with.has_hard_fail());
    assert_eq!(with.corrected.map(|o| o.direction), Some(Direction::Long));
}

// ──────────────────────────────────────────────
// Ledger feeding risk sizing
// ──────────────────────────────────────────────

fn long_position(symbol: &str, notional: f64) -> Position {
    Position {
        symbol: symbol.into(),
        direction: Direction::Long,
        entry_price: 100.0,
        size: notional / 100.0,
        stop_loss: None,
        take_profit: None,
    }
}

#[test]
fn open_exposure_shrinks_then_blocks_new_signals() {
    let candles = flush_series();
    let system = RunnerConfig::balanced().unwrap().system;
    let ledger = Arc::new(InMemoryLedger::new());
    let pipeline = Pipeline::from_config(&system).unwrap().with_ledger(ledger.clone());

    let decide = || {
        pipeline
            .evaluate("SOLUSDT", Timeframe::H1, &candles, None)
            .unwrap()
            .decision
    };

    let ScoreDecision::Signal(free) = decide() else {
        panic!("flush should signal with a flat ledger");
    };

    // Balanced cap: 220 capital at 5x leaves 1100 notional per symbol.
    ledger.open(long_position("SOLUSDT", 1095.0));
    assert_eq!(pipeline.open_notional("SOLUSDT"), 1095.0);
    let ScoreDecision::Signal(partial) = decide() else {
        panic!("headroom remains, expected a signal");
    };
    assert!((partial.risk.notional - 5.0).abs() < 1e-9);
    assert!(partial.risk.position_size < free.risk.position_size);

    ledger.open(long_position("SOLUSDT", 1100.0));
    match decide() {
        ScoreDecision::Hold(rejection) => assert_eq!(rejection.failed_step, FilterStep::Risk),
        ScoreDecision::Signal(_) => panic!("exposure cap reached, expected HOLD"),
    }

    // Other symbols are sized independently.
    assert_eq!(pipeline.open_notional("ETHUSDT"), 0.0);
}

// ──────────────────────────────────────────────
// Files
// ──────────────────────────────────────────────

#[test]
fn csv_candles_load_into_provider() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eth_1h.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    for c in flush_series() {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            c.timestamp.timestamp_millis(),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        )
        .unwrap();
    }
    drop(file);

    let candles = load_candles_csv(&path).unwrap();
    assert_eq!(candles, flush_series());

    let mut provider = InMemoryProvider::new();
    provider.insert_candles("ETHUSDT", Timeframe::H1, candles);
    assert_eq!(provider.get_candles("ETHUSDT", Timeframe::H1, 10).unwrap().len(), 10);
}

#[test]
fn config_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sentinel.toml");

    let mut config = RunnerConfig::balanced().unwrap();
    config.council.parallel = false;
    config.backtest.horizon = Horizon::Full;
    config.save(&path).unwrap();

    let loaded = RunnerConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn missing_config_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = RunnerConfig::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.toml"));
}

//! Integration tests for report export and reload.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sentinel_core::domain::{Candle, Timeframe};
use sentinel_runner::export::{
    export_json, export_resolved_csv, export_trades_csv, generate_summary, import_json,
    load_report, save_report,
};
use sentinel_runner::{BacktestConfig, BacktestReport, Backtester, RunnerConfig};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
}

/// Two flush cycles on the 4h chart.
fn series() -> Vec<Candle> {
    let mut candles = Vec::new();
    let mut level = 50.0_f64;
    for _ in 0..2 {
        for i in 0..70 {
            let close = level + (i as f64 * 0.9).sin() * 0.2;
            candles.push(Candle {
                timestamp: t0() + TimeDelta::hours(4 * candles.len() as i64),
                open: close,
                high: close + 0.25,
                low: close - 0.25,
                close,
                volume: 800.0,
            });
        }
        let prev = candles[candles.len() - 1].close;
        candles.push(Candle {
            timestamp: t0() + TimeDelta::hours(4 * candles.len() as i64),
            open: prev,
            high: prev + 0.1,
            low: prev * 0.94,
            close: prev * 0.945,
            volume: 3_500.0,
        });
        level = prev * 0.945;
    }
    candles
}

fn report() -> BacktestReport {
    let system = RunnerConfig::balanced().unwrap().system;
    Backtester::new(system, BacktestConfig::default())
        .unwrap()
        .run("LINKUSDT", Timeframe::H4, &series())
        .unwrap()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn json_round_trip_preserves_report() {
    let report = report();
    let json = export_json(&report).unwrap();
    assert_eq!(import_json(&json).unwrap(), report);
}

#[test]
fn future_schema_is_rejected() {
    let mut report = report();
    report.schema_version += 1;
    let json = export_json(&report).unwrap();
    let err = import_json(&json).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version"));
}

#[test]
fn trades_csv_has_one_row_per_trade() {
    let report = report();
    let csv = export_trades_csv(&report.trades).unwrap();
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("bar_index,exit_index,generated_at"));
    assert!(header.ends_with("r_multiple,loss_tags"));
    assert_eq!(lines.count(), report.trades.len());
}

#[test]
fn empty_resolved_csv_is_header_only() {
    let csv = export_resolved_csv(&[]).unwrap();
    assert_eq!(csv.lines().count(), 1);
    assert!(csv.starts_with("id,generated_at,symbol,timeframe,direction,result"));
}

#[test]
fn summary_lists_metrics() {
    let report = report();
    let md = generate_summary(&report);
    assert!(md.starts_with("# Backtest LINKUSDT 4h"));
    assert!(md.contains("| Win rate |"));
    assert!(md.contains(&report.run_id));
}

#[test]
fn saved_report_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let report = report();
    let run_dir = save_report(&report, dir.path()).unwrap();

    assert!(run_dir.join("trades.csv").exists());
    assert!(run_dir.join("summary.md").exists());
    assert_eq!(load_report(&run_dir).unwrap(), report);
}

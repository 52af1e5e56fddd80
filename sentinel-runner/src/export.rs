//! Export of backtest reports and tracked outcomes: JSON, CSV and Markdown.
//!
//! Reports carry a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sentinel_core::domain::TradeOutcome;

use crate::backtest::{BacktestReport, BacktestTrade, SCHEMA_VERSION};
use crate::tracker::ResolvedSignal;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

const OUTCOME_COLUMNS: [&str; 8] = [
    "result",
    "exit_reason",
    "entry_price",
    "exit_price",
    "bars_to_exit",
    "pnl_pct",
    "r_multiple",
    "loss_tags",
];

fn outcome_fields(o: &TradeOutcome) -> [String; 8] {
    let tags: Vec<String> = o.loss_tags.iter().map(|t| t.to_string()).collect();
    [
        o.state().to_string(),
        o.exit_reason.map(|r| r.to_string()).unwrap_or_default(),
        format!("{:.6}", o.entry_price),
        format!("{:.6}", o.exit_price),
        o.bars_to_exit.to_string(),
        format!("{:.4}", o.pnl_pct),
        format!("{:.4}", o.r_multiple),
        tags.join("|"),
    ]
}

/// One row per replayed trade.
///
/// Columns: bar_index, exit_index, generated_at, symbol, timeframe,
/// direction, confidence, stop_loss, take_profit, then the outcome columns.
pub fn export_trades_csv(trades: &[BacktestTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![
        "bar_index",
        "exit_index",
        "generated_at",
        "symbol",
        "timeframe",
        "direction",
        "confidence",
        "stop_loss",
        "take_profit",
    ];
    header.extend(OUTCOME_COLUMNS);
    wtr.write_record(&header)?;

    for t in trades {
        let s = &t.signal;
        let mut row = vec![
            t.bar_index.to_string(),
            t.exit_index.to_string(),
            s.generated_at.to_rfc3339(),
            s.symbol.clone(),
            s.timeframe.to_string(),
            s.direction.to_string(),
            format!("{:.1}", s.confidence),
            format!("{:.6}", s.stop_loss),
            format!("{:.6}", s.take_profit),
        ];
        row.extend(outcome_fields(&t.outcome));
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per signal resolved by the live tracker.
pub fn export_resolved_csv(resolved: &[ResolvedSignal]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["id", "generated_at", "symbol", "timeframe", "direction"];
    header.extend(OUTCOME_COLUMNS);
    wtr.write_record(&header)?;

    for r in resolved {
        let mut row = vec![
            r.id.to_string(),
            r.signal.generated_at.to_rfc3339(),
            r.signal.symbol.clone(),
            r.signal.timeframe.to_string(),
            r.signal.direction.to_string(),
        ];
        row.extend(outcome_fields(&r.outcome));
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown summary ───────────────────────────────────────────────

pub fn generate_summary(report: &BacktestReport) -> String {
    let m = &report.metrics;
    let mut md = String::with_capacity(1024);

    md.push_str(&format!("# Backtest {} {}\n\n", report.symbol, report.timeframe));
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run | {} |\n", report.run_id));
    md.push_str(&format!("| Bars | {} ({} warmup) |\n", report.bars, report.warmup));
    md.push_str(&format!(
        "| Signals | {} ({} skipped while in a trade) |\n",
        report.signals_emitted, report.skipped_overlapping
    ));
    md.push_str(&format!("| Closed trades | {} ({} open) |\n", m.trade_count, m.open_count));
    md.push_str(&format!("| Win rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Expectancy | {:.2}R |\n", m.expectancy_r));
    md.push_str(&format!("| Max drawdown | {:.2}R |\n", m.max_drawdown_r));
    md.push_str(&format!("| Avg bars to exit | {:.1} |\n", m.avg_bars_to_exit));
    md.push_str(&format!("| Max consecutive losses | {} |\n", m.max_consecutive_losses));

    if !m.exit_reasons.is_empty() {
        md.push_str("\n## Exit reasons\n\n");
        for (reason, count) in &m.exit_reasons {
            md.push_str(&format!("- {reason}: {count}\n"));
        }
    }
    if !m.loss_tags.is_empty() {
        md.push_str("\n## Loss causes\n\n");
        for (tag, count) in &m.loss_tags {
            md.push_str(&format!("- {tag}: {count}\n"));
        }
    }
    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `report.json`, `trades.csv` and `summary.md` into
/// `{symbol}_{timeframe}_{run_id prefix}/` under `output_dir`.
pub fn save_report(report: &BacktestReport, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = report.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}_{}", report.symbol, report.timeframe, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create report dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&report.trades)?)?;
    std::fs::write(run_dir.join("summary.md"), generate_summary(report))?;

    Ok(run_dir)
}

pub fn load_report(dir: &Path) -> Result<BacktestReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

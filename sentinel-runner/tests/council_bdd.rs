//! BDD tests for the consensus council.

use chrono::{TimeZone, Utc};
use sentinel_core::domain::{Direction, Signal, Timeframe};
use sentinel_core::regime::RegimeLabel;
use sentinel_core::snapshot::IndicatorBundle;
use sentinel_runner::council::{
    Analyst, AnalystInput, AnalystOpinion, Condition, ConditionThresholds, Insight,
    MarketConditions,
};
use sentinel_runner::{Council, CouncilAction, CouncilConfig, CouncilError};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn bundle(rsi: f64, change: f64, close: f64, ema_slow: f64) -> IndicatorBundle {
    IndicatorBundle {
        timestamp: Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap(),
        close,
        rsi: Some(rsi),
        atr: Some(close * 0.02),
        ema_fast: Some(ema_slow),
        ema_slow: Some(ema_slow),
        volume_ratio: Some(1.0),
        range_position: 0.5,
        volatility_pct: 2.0,
        change_pct: Some(change),
        trailing_change_pct: Some(change),
        order_book_imbalance: None,
        whale_activity: None,
        whale_side: None,
    }
}

fn long_signal(entry: f64) -> Signal {
    Signal {
        symbol: "SOLUSDT".into(),
        timeframe: Timeframe::H4,
        direction: Direction::Long,
        confidence: 62.0,
        entry_price: entry,
        stop_loss: entry * 0.96,
        take_profit: entry * 1.08,
        reasoning: vec![],
        source_analyst: "signal_scorer".into(),
        generated_at: Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap(),
    }
}

fn config(parallel: bool) -> CouncilConfig {
    CouncilConfig {
        parallel,
        ..CouncilConfig::default()
    }
}

/// Always answers with the same score.
struct Constant(&'static str, f64);

impl Analyst for Constant {
    fn id(&self) -> &str {
        self.0
    }

    fn style(&self) -> &str {
        "constant"
    }

    fn evaluate(&self, input: &AnalystInput<'_>) -> AnalystOpinion {
        AnalystOpinion::from_score(self, self.1, vec![format!("always {}", self.1)], input)
    }
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[test]
fn bdd_scenario_parallel_and_sequential_dispatch_agree() {
    // GIVEN a capitulation snapshot with a candidate long
    let b = bundle(22.0, -12.0, 88.0, 100.0);
    let signal = long_signal(88.0);

    // WHEN the standard council convenes in both dispatch modes
    let parallel = Council::standard(config(true)).unwrap();
    let sequential = Council::standard(config(false)).unwrap();
    let a = parallel.convene(&b, RegimeLabel::Range, Some(&signal)).unwrap();
    let s = sequential.convene(&b, RegimeLabel::Range, Some(&signal)).unwrap();

    // THEN the results are identical, opinions in registration order
    assert_eq!(a, s);
    let ids: Vec<&str> = a.opinions.iter().map(|o| o.analyst_id.as_str()).collect();
    assert_eq!(ids, parallel.analyst_ids());
    assert_eq!(a.opinions.len(), 6);

    // AND every opinion carries a recommendation on the candidate
    assert!(a.opinions.iter().all(|o| o.recommendation.is_some()));
}

#[test]
fn bdd_scenario_capitulation_raises_market_insights() {
    // GIVEN a snapshot with RSI 22 after a 12% fall
    let b = bundle(22.0, -12.0, 88.0, 100.0);

    // WHEN the council convenes without a candidate
    let result = Council::standard(CouncilConfig::default())
        .unwrap()
        .convene(&b, RegimeLabel::Bear, None)
        .unwrap();

    // THEN the oversold and extreme-move insights are present
    assert!(result.insights.contains(&Insight::RsiOversold));
    assert!(result.insights.contains(&Insight::ExtremeVolatility));
    assert!(!result.insights.contains(&Insight::RsiOverbought));

    // AND the average is the plain mean of the opinions
    let mean = result.opinions.iter().map(|o| o.score).sum::<f64>() / result.opinions.len() as f64;
    assert!((result.average_score - mean).abs() < 1e-9);
}

#[test]
fn bdd_scenario_conditions_are_shared_by_every_analyst() {
    // GIVEN the same capitulation snapshot
    let b = bundle(22.0, -12.0, 88.0, 100.0);
    let signal = long_signal(88.0);

    // WHEN conditions are evaluated with default thresholds
    let thresholds = ConditionThresholds::default();
    let conditions =
        MarketConditions::evaluate(&b, RegimeLabel::Range, Some(&signal), &thresholds);

    // THEN oversold, fear, extremes and deep value are active
    for c in [Condition::Oversold, Condition::Fear, Condition::Extremes, Condition::DeepValue] {
        assert!(conditions.has(c), "{c} should be active");
    }
    assert!(!conditions.has(Condition::Overbought));
    assert!(conditions.has(Condition::SystemSignal));
}

#[test]
fn bdd_scenario_unanimous_buyers_open_long() {
    // GIVEN three analysts that all score 80
    let analysts: Vec<Box<dyn Analyst>> = vec![
        Box::new(Constant("a", 80.0)),
        Box::new(Constant("b", 80.0)),
        Box::new(Constant("c", 80.0)),
    ];
    let council = Council::new(analysts, CouncilConfig::default()).unwrap();

    // WHEN they convene
    let result = council
        .convene(&bundle(50.0, 0.0, 100.0, 100.0), RegimeLabel::Bull, None)
        .unwrap();

    // THEN the action is BUY with full agreement and a bullish insight
    assert_eq!(result.action, CouncilAction::Buy);
    assert!(result.agreement);
    assert_eq!(result.insights, vec![Insight::UnanimousBullish]);
}

#[test]
fn bdd_scenario_duplicate_registration_is_refused() {
    // GIVEN two analysts sharing an id
    let analysts: Vec<Box<dyn Analyst>> = vec![
        Box::new(Constant("dup", 40.0)),
        Box::new(Constant("dup", 60.0)),
    ];

    // WHEN the council is built
    let err = Council::new(analysts, CouncilConfig::default()).unwrap_err();

    // THEN the registry error names the analyst
    assert_eq!(err, CouncilError::DuplicateAnalyst("dup".into()));
}

//! Integration tests for the live signal tracker.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sentinel_core::domain::{
    Candle, Direction, ExitReason, LossTag, Signal, Timeframe, TradeResult, TradeState,
};
use sentinel_core::simulator::{AmbiguityPolicy, Horizon, SimulatorConfig, TradeSimulator};
use sentinel_core::CoreError;
use sentinel_runner::{ResolvedSignal, SignalTracker, TrackerError};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap()
}

fn signal(symbol: &str, direction: Direction, entry: f64, stop: f64, target: f64) -> Signal {
    Signal {
        symbol: symbol.into(),
        timeframe: Timeframe::M15,
        direction,
        confidence: 58.0,
        entry_price: entry,
        stop_loss: stop,
        take_profit: target,
        reasoning: vec![],
        source_analyst: "signal_scorer".into(),
        generated_at: t0(),
    }
}

/// The `k`-th 15m candle after `t0`, as (open, high, low, close).
fn candle(k: i64, (open, high, low, close): (f64, f64, f64, f64)) -> Candle {
    Candle {
        timestamp: t0() + TimeDelta::minutes(15 * k),
        open,
        high,
        low,
        close,
        volume: 500.0,
    }
}

fn tracker() -> SignalTracker {
    SignalTracker::new(SimulatorConfig::default()).unwrap()
}

fn series(first: i64, rows: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    rows.iter()
        .enumerate()
        .map(|(i, &row)| candle(first + i as i64, row))
        .collect()
}

/// Feed `forward` one candle at a time and collect everything resolved.
fn feed(tracker: &mut SignalTracker, symbol: &str, forward: &[Candle]) -> Vec<ResolvedSignal> {
    let mut resolved = Vec::new();
    for c in forward {
        resolved.extend(tracker.on_candle(symbol, Timeframe::M15, *c).unwrap());
    }
    resolved
}

/// Long from 100 with a 98 stop; the close recovers above entry after the stop.
const STOP_HUNT: [(f64, f64, f64, f64); 5] = [
    (100.0, 100.5, 97.5, 98.5),
    (98.5, 101.0, 98.2, 100.8),
    (100.8, 102.0, 100.5, 101.5),
    (101.5, 102.0, 101.0, 101.8),
    (101.8, 102.5, 101.5, 102.0),
];

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn resolves_on_target_and_matches_batch_simulation() {
    let mut tracker = tracker();
    let s = signal("BTCUSDT", Direction::Long, 100.0, 98.0, 103.0);
    tracker.register(s.clone(), &[]).unwrap();

    let rows = [(100.0, 101.0, 99.5, 100.8), (100.8, 103.5, 100.5, 103.2)];
    assert!(tracker.on_candle("BTCUSDT", Timeframe::M15, candle(1, rows[0])).unwrap().is_empty());
    let resolved = tracker.on_candle("BTCUSDT", Timeframe::M15, candle(2, rows[1])).unwrap();

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].outcome.result, TradeResult::Win);
    assert_eq!(resolved[0].outcome.exit_reason, Some(ExitReason::TakeProfitHit));
    assert!(tracker.pending().is_empty());

    let forward = vec![candle(1, rows[0]), candle(2, rows[1])];
    let batch = TradeSimulator::new(SimulatorConfig::default())
        .unwrap()
        .simulate(&s, &[], &forward, SimulatorConfig::default().quick_horizon())
        .unwrap();
    assert_eq!(resolved[0].outcome, batch);
}

#[test]
fn quick_horizon_time_exits() {
    let mut tracker = tracker().with_horizon(Horizon::Bars(3)).unwrap();
    tracker
        .register(signal("ETHUSDT", Direction::Short, 100.0, 103.0, 95.0), &[])
        .unwrap();

    let mut resolved = Vec::new();
    for k in 1..=3 {
        resolved.extend(
            tracker
                .on_candle("ETHUSDT", Timeframe::M15, candle(k, (100.0, 100.5, 99.0, 99.5)))
                .unwrap(),
        );
    }
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].outcome.state(), TradeState::TimeExit);
    assert_eq!(resolved[0].outcome.bars_to_exit, 3);
}

#[test]
fn other_series_and_stale_candles_are_ignored() {
    let mut tracker = tracker();
    tracker
        .register(signal("BTCUSDT", Direction::Long, 100.0, 98.0, 103.0), &[])
        .unwrap();

    // Different symbol, different timeframe, and the signal candle itself
    let quiet = (100.0, 100.2, 99.8, 100.0);
    tracker.on_candle("SOLUSDT", Timeframe::M15, candle(1, quiet)).unwrap();
    tracker.on_candle("BTCUSDT", Timeframe::H1, candle(4, quiet)).unwrap();
    tracker.on_candle("BTCUSDT", Timeframe::M15, candle(0, quiet)).unwrap();

    assert_eq!(tracker.pending().len(), 1);
    assert!(tracker.pending()[0].forward.is_empty());
}

#[test]
fn gap_is_reported_without_mutation() {
    let mut tracker = tracker();
    let id = tracker
        .register(signal("BTCUSDT", Direction::Long, 100.0, 98.0, 103.0), &[])
        .unwrap();

    let err = tracker
        .on_candle("BTCUSDT", Timeframe::M15, candle(2, (100.0, 100.2, 99.8, 100.0)))
        .unwrap_err();

    assert!(matches!(err, TrackerError::Gap { id: gap_id, .. } if gap_id == id));
    assert!(tracker.pending()[0].forward.is_empty());
}

#[test]
fn hold_and_disordered_signals_are_refused() {
    let mut tracker = tracker();
    assert!(tracker
        .register(signal("BTCUSDT", Direction::Hold, 100.0, 98.0, 103.0), &[])
        .is_err());
    assert!(tracker
        .register(signal("BTCUSDT", Direction::Long, 100.0, 101.0, 103.0), &[])
        .is_err());
    assert!(tracker.pending().is_empty());
}

#[test]
fn drain_hands_over_resolved_signals() {
    let mut tracker = tracker();
    tracker
        .register(signal("BTCUSDT", Direction::Long, 100.0, 98.0, 103.0), &[])
        .unwrap();
    let mut forward = vec![candle(1, (100.0, 100.1, 97.0, 97.5))];
    forward.extend(series(2, &[(97.5, 97.8, 96.5, 97.0); 4]));
    feed(&mut tracker, "BTCUSDT", &forward[..1]);
    assert_eq!(tracker.pending().len(), 1);
    assert!(tracker.resolved().is_empty());
    feed(&mut tracker, "BTCUSDT", &forward[1..]);

    let drained = tracker.drain_resolved();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].outcome.result, TradeResult::Loss);
    assert!(tracker.resolved().is_empty());
}

// ──────────────────────────────────────────────
// Live and replay agree
// ──────────────────────────────────────────────

#[test]
fn stop_hunt_is_tagged_live_as_in_replay() {
    let s = signal("BTCUSDT", Direction::Long, 100.0, 98.0, 110.0);
    let forward = series(1, &STOP_HUNT);
    let mut tracker = tracker().with_horizon(Horizon::Bars(5)).unwrap();
    tracker.register(s.clone(), &[]).unwrap();

    // Stopped on the first candle, but held until the horizon elapses.
    assert!(feed(&mut tracker, "BTCUSDT", &forward[..1]).is_empty());
    let held = tracker.pending()[0].outcome.clone().expect("simulated");
    assert_eq!(held.exit_reason, Some(ExitReason::StopLossHit));
    assert!(feed(&mut tracker, "BTCUSDT", &forward[1..4]).is_empty());

    let resolved = feed(&mut tracker, "BTCUSDT", &forward[4..]);
    assert_eq!(resolved.len(), 1);
    let live = &resolved[0].outcome;
    assert!(live.loss_tags.contains(&LossTag::StopHunt));
    assert_eq!(live.bars_to_exit, 1);
    assert_eq!(live.exit_price, held.exit_price);

    let replay = TradeSimulator::new(SimulatorConfig::default())
        .unwrap()
        .simulate(&s, &[], &forward, Horizon::Bars(5))
        .unwrap();
    assert_eq!(*live, replay);
}

#[test]
fn live_outcomes_match_replay_for_every_exit_path() {
    // Pre-trade context: a slide into the signal candle at t0.
    let context = series(
        -3,
        &[
            (104.0, 104.5, 102.5, 103.0),
            (103.0, 103.2, 101.5, 102.0),
            (102.0, 102.3, 100.6, 101.0),
            (101.0, 101.2, 99.6, 100.0),
        ],
    );
    let scenarios: [(&str, f64, [(f64, f64, f64, f64); 5]); 5] = [
        (
            "target",
            103.0,
            [
                (100.0, 101.0, 99.5, 100.8),
                (100.8, 103.5, 100.5, 103.2),
                (103.2, 103.6, 102.8, 103.0),
                (103.0, 103.4, 102.5, 102.9),
                (102.9, 103.1, 102.4, 102.6),
            ],
        ),
        (
            "stop",
            110.0,
            [
                (100.0, 100.2, 97.5, 97.8),
                (97.8, 98.0, 96.0, 96.5),
                (96.5, 97.0, 95.5, 96.0),
                (96.0, 96.4, 95.0, 95.2),
                (95.2, 95.6, 94.8, 95.0),
            ],
        ),
        ("stop hunt", 110.0, STOP_HUNT),
        ("time exit", 110.0, [(100.0, 100.6, 99.4, 100.2); 5]),
        (
            "ambiguous",
            104.0,
            [
                (103.0, 105.0, 97.5, 100.0),
                (100.0, 100.8, 99.5, 100.4),
                (100.4, 101.0, 100.0, 100.7),
                (100.7, 101.2, 100.3, 101.0),
                (101.0, 101.5, 100.6, 101.2),
            ],
        ),
    ];
    let policies = [
        AmbiguityPolicy::StopFirst,
        AmbiguityPolicy::TargetFirst,
        AmbiguityPolicy::OhlcPath,
    ];

    for policy in policies {
        let config = SimulatorConfig {
            ambiguity_policy: policy,
            ..SimulatorConfig::default()
        };
        let simulator = TradeSimulator::new(config.clone()).unwrap();
        for (name, target, rows) in &scenarios {
            let s = signal("ETHUSDT", Direction::Long, 100.0, 98.0, *target);
            let forward = series(1, rows);
            let mut tracker = SignalTracker::new(config.clone()).unwrap();
            tracker.register(s.clone(), &context).unwrap();

            let resolved = feed(&mut tracker, "ETHUSDT", &forward);

            assert_eq!(resolved.len(), 1, "{name} under {policy:?} did not resolve");
            assert!(tracker.pending().is_empty());
            let replay = simulator
                .simulate(&s, &context, &forward, config.quick_horizon())
                .unwrap();
            assert_eq!(resolved[0].outcome, replay, "{name} under {policy:?}");
        }
    }
}

#[test]
fn ambiguous_bar_follows_the_policy_live() {
    let mut quiet = vec![candle(1, (103.0, 105.0, 97.5, 100.0))];
    quiet.extend(series(2, &[(100.0, 100.8, 99.5, 100.4); 4]));
    let outcome = |policy| {
        let config = SimulatorConfig {
            ambiguity_policy: policy,
            ..SimulatorConfig::default()
        };
        let mut tracker = SignalTracker::new(config).unwrap();
        tracker
            .register(signal("BTCUSDT", Direction::Long, 100.0, 98.0, 104.0), &[])
            .unwrap();
        feed(&mut tracker, "BTCUSDT", &quiet).remove(0).outcome
    };

    assert_eq!(outcome(AmbiguityPolicy::StopFirst).result, TradeResult::Loss);
    assert_eq!(outcome(AmbiguityPolicy::TargetFirst).result, TradeResult::Win);
    assert_eq!(outcome(AmbiguityPolicy::OhlcPath).result, TradeResult::Win);
}

#[test]
fn unbounded_horizon_is_refused() {
    let err = tracker().with_horizon(Horizon::Full).unwrap_err();
    assert!(matches!(err, TrackerError::Core(CoreError::InvalidConfig(_))));
    assert!(tracker().with_horizon(Horizon::Bars(0)).is_err());

    let mut tracker = tracker();
    tracker
        .register(signal("BTCUSDT", Direction::Long, 100.0, 98.0, 103.0), &[])
        .unwrap();
    let resolved = feed(&mut tracker, "BTCUSDT", &[candle(1, (100.0, 100.4, 99.6, 100.1))]);
    assert!(resolved.is_empty());
    assert_eq!(tracker.horizon(), Horizon::Bars(5));
}

//! Sentinel Runner: everything that fans out or keeps state across calls.
//!
//! This crate builds on `sentinel-core` to provide:
//! - The consensus council with parallel analyst dispatch
//! - An evaluation pipeline from candles to a scored, council-checked signal
//! - Historical backtest replay with R-multiple metrics and run fingerprints
//! - A live tracker resolving emitted signals as candles close
//! - Market data and position collaborator traits with in-memory and CSV
//!   implementations
//! - Config-file loading, result export and logging setup

pub mod backtest;
pub mod config;
pub mod council;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod tracker;

pub use backtest::{
    compute_dataset_hash, outcome_fingerprint, BacktestConfig, BacktestError, BacktestReport,
    BacktestTrade, Backtester,
};
pub use config::RunnerConfig;
pub use council::{ConsensusResult, Council, CouncilAction, CouncilConfig, CouncilError, Verdict};
pub use logging::init_tracing;
pub use metrics::BacktestMetrics;
pub use pipeline::{Evaluation, Pipeline, PipelineError};
pub use provider::{
    load_candles_csv, parse_candles_csv, InMemoryLedger, InMemoryProvider, LoadError,
    MarketDataProvider, PositionLedger,
};
pub use tracker::{ResolvedSignal, SignalTracker, TrackedSignal, TrackerError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn council_is_send_sync() {
        assert_send::<Council>();
        assert_sync::<Council>();
        assert_send::<ConsensusResult>();
        assert_sync::<ConsensusResult>();
    }

    #[test]
    fn pipeline_and_backtester_are_send_sync() {
        assert_send::<Pipeline>();
        assert_sync::<Pipeline>();
        assert_send::<Backtester>();
        assert_sync::<Backtester>();
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
    }

    #[test]
    fn collaborators_are_send_sync() {
        assert_send::<InMemoryProvider>();
        assert_sync::<InMemoryProvider>();
        assert_send::<InMemoryLedger>();
        assert_sync::<InMemoryLedger>();
        assert_send::<SignalTracker>();
        assert_sync::<SignalTracker>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunnerConfig>();
        assert_sync::<RunnerConfig>();
    }
}

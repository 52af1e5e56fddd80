//! Sentinel Core: pure signal-evaluation components.
//!
//! - Domain types (candles, order books, signals, positions, outcomes)
//! - Indicators with NaN warmup and a snapshot builder that turns them into
//!   an indicator bundle
//! - Regime classification and the tradability gate
//! - Signal scoring through an ordered hard-filter chain with a trace
//! - ATR-based risk parameters
//! - Bar-by-bar trade outcome simulation with loss-cause tags
//! - Free-text signal parsing and sanity validation
//!
//! Nothing in this crate performs I/O or holds state between calls.

pub mod config;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod regime;
pub mod risk;
pub mod scoring;
pub mod simulator;
pub mod snapshot;
pub mod validator;

pub use config::SystemConfig;
pub use error::{CoreError, Result};

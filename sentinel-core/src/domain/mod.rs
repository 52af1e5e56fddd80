//! Domain types: candles, order books, signals, positions, outcomes.

pub mod candle;
pub mod order_book;
pub mod outcome;
pub mod position;
pub mod signal;
pub mod timeframe;

pub use candle::Candle;
pub use order_book::{BookLevel, OrderBookSnapshot};
pub use outcome::{ExitReason, LossTag, TradeOutcome, TradeResult, TradeState};
pub use position::Position;
pub use signal::{Direction, Signal};
pub use timeframe::Timeframe;

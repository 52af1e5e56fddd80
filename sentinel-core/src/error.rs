//! Error taxonomy for the signal core.
//!
//! Data gaps are not errors: they surface as absent indicator fields and
//! propagate fail-closed into a HOLD. The variants here are either
//! recoverable-by-waiting (`InsufficientHistory`), blocking
//! (`IndeterminateRisk`), or caller contract violations that must not be
//! retried (`NonContiguousWindow`, `InvalidInput`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("insufficient history: {available} candles available, at least {required} required")]
    InsufficientHistory { required: usize, available: usize },

    #[error("indeterminate risk: {0}")]
    IndeterminateRisk(String),

    #[error("non-contiguous forward window at index {index}: {detail}")]
    NonContiguousWindow { index: usize, detail: String },

    #[error("malformed signal text: {0}")]
    MalformedSignalText(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Whether waiting for more data could clear the error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::InsufficientHistory { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_insufficient_history_is_recoverable() {
        assert!(CoreError::InsufficientHistory {
            required: 15,
            available: 3
        }
        .is_recoverable());
        assert!(!CoreError::IndeterminateRisk("atr absent".into()).is_recoverable());
        assert!(!CoreError::NonContiguousWindow {
            index: 2,
            detail: "gap".into()
        }
        .is_recoverable());
    }

    #[test]
    fn messages_name_the_counts() {
        let err = CoreError::InsufficientHistory {
            required: 15,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "insufficient history: 3 candles available, at least 15 required"
        );
    }
}

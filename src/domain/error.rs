//! Domain error types.

use chrono::NaiveDateTime;
use std::time::Duration;

/// Top-level error type for pairtrader.
#[derive(Debug, thiserror::Error)]
pub enum PairtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("out-of-order observation: {current} is not after {previous}")]
    OutOfOrderData {
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("no data for {instrument_a}/{instrument_b}")]
    NoData {
        instrument_a: String,
        instrument_b: String,
    },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("notification error: {reason}")]
    Notification { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PairtraderError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        PairtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        PairtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&PairtraderError> for std::process::ExitCode {
    fn from(err: &PairtraderError) -> Self {
        let code: u8 = match err {
            PairtraderError::Io(_) => 1,
            PairtraderError::ConfigParse { .. }
            | PairtraderError::ConfigMissing { .. }
            | PairtraderError::ConfigInvalid { .. } => 2,
            PairtraderError::Storage { .. } | PairtraderError::Notification { .. } => 3,
            PairtraderError::OutOfOrderData { .. }
            | PairtraderError::NoData { .. }
            | PairtraderError::MarketData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

/// Failure of an advisory gate call. Every variant is treated as a reject.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdvisoryError {
    #[error("advisory call timed out after {0:?}")]
    Timeout(Duration),

    #[error("advisory call failed: {0}")]
    Failed(String),

    #[error("malformed advisory response: {0}")]
    Malformed(String),
}

//! Error types for the pipeline and the data layer.
//!
//! `EngineError` covers everything the rank/position/cost pipeline can reject.
//! `DataError` covers the price table boundary: validation, CSV, Parquet, cache.
//! A panel that made it past `PriceTable::new` is assumed valid by the engine.

use thiserror::Error;

/// Errors raised by the signal pipeline and the parameter search built on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("insufficient data for {context}: need {required} rows, have {available}")]
    InsufficientData {
        context: &'static str,
        required: usize,
        available: usize,
    },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("no viable lookback: all {candidates} candidates were degenerate or failed")]
    NoViableParameter { candidates: usize },

    #[error("misaligned panels: {0}")]
    Misaligned(String),
}

impl EngineError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Errors raised while building, reading or caching a price table.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("no cached dataset '{name}' (run `xsmom cache import {name}` first)")]
    NoCachedData { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::Csv(err.to_string())
    }
}

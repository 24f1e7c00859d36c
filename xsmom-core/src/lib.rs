//! xsmom core — cross-sectional momentum signal pipeline and price data layer.
//!
//! - Domain types (time x asset panels, the validated price table, strategy parameters)
//! - Pipeline: returns -> trailing-sum ranks -> long/short positions -> net of costs
//! - Point-in-time signal for the latest row
//! - Data layer: quote resampling, wide CSV, Parquet cache, synthetic panels

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;

pub use domain::{PriceTable, StrategyConfig};
pub use error::{DataError, EngineError};

//! xsmom runner — configuration, parameter sweep, walk-forward validation,
//! metrics and artifact export.
//!
//! This crate builds on `xsmom-core` to provide:
//! - TOML configuration with documented defaults
//! - Price loading from CSV, the Parquet cache, or a synthetic panel
//! - Lookback sweep (rayon-parallel) scored by annualized Sharpe
//! - Walk-forward harness: fit on training rows, report train/test/full
//! - Daily long/short signal from the fitted lookback
//! - JSON/CSV/Markdown artifacts with schema versioning

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod serde_float;
pub mod sweep;
pub mod walk_forward;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{import_csv, load_prices, LoadError, LoadOptions, LoadedPrices, PriceSpec};
pub use metrics::PerformanceReport;
pub use runner::{
    run_backtest, run_backtest_from_data, run_signal, run_signal_from_data, BacktestResult,
    BacktestRun, Provenance, RunError, SignalResult, SCHEMA_VERSION,
};
pub use sweep::{CandidateOutcome, LookbackRange, LookbackSweep, SweepConfig, SweepResult};
pub use walk_forward::{
    fit_lookback, run_daily_signal, run_walk_forward, split_chronological, DailySignalReport,
    Partition, PartitionEvaluations, SplitSpec, WalkForwardConfig, WalkForwardError,
    WalkForwardReport, WalkForwardRun,
};

//! Backtest runner — wires together loading, the walk-forward harness, and
//! provenance.
//!
//! Two entry points per command:
//! - `run_backtest()` / `run_signal()`: load prices, then run. Used by the CLI.
//! - `run_backtest_from_data()` / `run_signal_from_data()`: take pre-loaded
//!   prices, no I/O. Used by tests and benchmarks.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xsmom_core::data::DataSource;
use xsmom_core::EngineError;

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_prices, LoadError, LoadOptions, LoadedPrices, PriceSpec};
use crate::walk_forward::{
    run_daily_signal, run_walk_forward, DailySignalReport, PartitionEvaluations,
    WalkForwardError, WalkForwardReport,
};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("walk-forward error: {0}")]
    WalkForward(#[from] WalkForwardError),
    #[error("signal error: {0}")]
    Engine(#[from] EngineError),
    #[error("failed to hash config: {0}")]
    RunId(#[from] serde_json::Error),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Where the prices of a run came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: DataSource,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub dropped_buckets: usize,
    pub assets: Vec<String>,
    pub rows: usize,
}

impl Provenance {
    fn of(loaded: &LoadedPrices) -> Self {
        Self {
            source: loaded.source,
            dataset_hash: loaded.dataset_hash.clone(),
            has_synthetic: loaded.has_synthetic,
            dropped_buckets: loaded.dropped_buckets,
            assets: loaded.table.assets().to_vec(),
            rows: loaded.table.len(),
        }
    }
}

/// Persisted result of one walk-forward backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub config: BacktestConfig,
    pub data: Provenance,
    pub report: WalkForwardReport,
}

/// A backtest result plus the panels behind it (not persisted as JSON).
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub result: BacktestResult,
    pub evaluations: PartitionEvaluations,
}

/// Persisted result of the daily signal command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub config: BacktestConfig,
    pub data: Provenance,
    pub report: DailySignalReport,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load prices, then run the walk-forward backtest.
pub fn run_backtest(
    config: &BacktestConfig,
    spec: &PriceSpec,
    opts: &LoadOptions,
) -> Result<BacktestRun, RunError> {
    config.validate()?;
    let loaded = load_prices(spec, opts)?;
    run_backtest_from_data(config, &loaded)
}

/// Run the walk-forward backtest on pre-loaded prices — no I/O.
pub fn run_backtest_from_data(
    config: &BacktestConfig,
    loaded: &LoadedPrices,
) -> Result<BacktestRun, RunError> {
    config.validate()?;
    let run = run_walk_forward(&loaded.table, &config.walk_forward_config())?;
    Ok(BacktestRun {
        result: BacktestResult {
            schema_version: SCHEMA_VERSION,
            run_id: config.run_id()?,
            config: config.clone(),
            data: Provenance::of(loaded),
            report: run.report,
        },
        evaluations: run.evaluations,
    })
}

/// Load prices, then fit on all of them and read the latest signal.
pub fn run_signal(
    config: &BacktestConfig,
    spec: &PriceSpec,
    opts: &LoadOptions,
) -> Result<SignalResult, RunError> {
    config.validate()?;
    let loaded = load_prices(spec, opts)?;
    run_signal_from_data(config, &loaded)
}

/// Daily signal on pre-loaded prices — no I/O.
pub fn run_signal_from_data(
    config: &BacktestConfig,
    loaded: &LoadedPrices,
) -> Result<SignalResult, RunError> {
    config.validate()?;
    let report = run_daily_signal(&loaded.table, &config.sweep_config(), config.sweep.parallel)?;
    Ok(SignalResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id()?,
        config: config.clone(),
        data: Provenance::of(loaded),
        report,
    })
}

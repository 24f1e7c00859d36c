//! Backtest configuration — a TOML document with one section per concern.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! baseline run. CLI flags are applied on top of the parsed value by the
//! caller; nothing here reads process-wide state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xsmom_core::domain::{periods_per_year, StrategyConfig};

use crate::sweep::{LookbackRange, SweepConfig};
use crate::walk_forward::WalkForwardConfig;

/// Errors from loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data: DataSection,
    pub strategy: StrategySection,
    pub sweep: SweepSection,
    pub walk_forward: WalkForwardSection,
    pub output: OutputSection,
}

/// `[data]`: resampling and where prices come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub period_hours: u32,
    pub cache_dir: PathBuf,
    /// Rows generated for `--synthetic` runs.
    pub synthetic_rows: usize,
    pub synthetic_seed: String,
    /// Synthetic universe; empty means the built-in ten USDT pairs.
    pub assets: Vec<String>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            period_hours: StrategyConfig::DEFAULT_PERIOD_HOURS,
            cache_dir: PathBuf::from("data/cache"),
            // three years of 12-hour bars
            synthetic_rows: 2190,
            synthetic_seed: "xsmom".into(),
            assets: Vec::new(),
        }
    }
}

/// `[strategy]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    pub top_k: usize,
    pub cost_rate: f64,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            top_k: StrategyConfig::DEFAULT_TOP_K,
            cost_rate: StrategyConfig::DEFAULT_COST_RATE,
        }
    }
}

/// `[sweep]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSection {
    pub lookback_min: usize,
    pub lookback_max: usize,
    pub parallel: bool,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            lookback_min: LookbackRange::DEFAULT_MIN,
            lookback_max: LookbackRange::DEFAULT_MAX,
            parallel: true,
        }
    }
}

/// `[walk_forward]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardSection {
    /// Fraction of rows in the training partition, in (0, 1).
    pub split_fraction: f64,
    /// Overrides `365 * 24 / period_hours` when set.
    pub periods_per_year: Option<f64>,
}

impl Default for WalkForwardSection {
    fn default() -> Self {
        Self {
            split_fraction: 0.75,
            periods_per_year: None,
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backtest_results"),
        }
    }
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Data-independent checks. Limits that depend on the loaded table
    /// (top_k vs. universe size, lookback vs. rows) are checked by the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.period_hours == 0 {
            return Err(ConfigError::Invalid("data.period_hours must be >= 1".into()));
        }
        if self.strategy.top_k == 0 {
            return Err(ConfigError::Invalid("strategy.top_k must be >= 1".into()));
        }
        if !self.strategy.cost_rate.is_finite() || self.strategy.cost_rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "strategy.cost_rate must be finite and >= 0, got {}",
                self.strategy.cost_rate
            )));
        }
        self.lookback_range()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("sweep: {e}")))?;
        let f = self.walk_forward.split_fraction;
        if !(f > 0.0 && f < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "walk_forward.split_fraction must be in (0, 1), got {f}"
            )));
        }
        if let Some(p) = self.walk_forward.periods_per_year {
            if !p.is_finite() || p <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "walk_forward.periods_per_year must be > 0, got {p}"
                )));
            }
        }
        Ok(())
    }

    /// Annualization factor: the override, else `365 * 24 / period_hours`.
    pub fn periods_per_year(&self) -> f64 {
        self.walk_forward
            .periods_per_year
            .unwrap_or_else(|| periods_per_year(self.data.period_hours))
    }

    pub fn lookback_range(&self) -> LookbackRange {
        LookbackRange {
            min: self.sweep.lookback_min,
            max: self.sweep.lookback_max,
        }
    }

    /// Core strategy parameters for one lookback.
    pub fn strategy(&self, lookback: usize) -> StrategyConfig {
        self.sweep_config().strategy(lookback)
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            range: self.lookback_range(),
            top_k: self.strategy.top_k,
            cost_rate: self.strategy.cost_rate,
            period_hours: self.data.period_hours,
            periods_per_year: self.periods_per_year(),
        }
    }

    pub fn walk_forward_config(&self) -> WalkForwardConfig {
        WalkForwardConfig {
            sweep: self.sweep_config(),
            split_fraction: self.walk_forward.split_fraction,
            parallel: self.sweep.parallel,
        }
    }

    /// Content hash of the configuration, used to name run artifacts.
    pub fn run_id(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_baseline() {
        let config = BacktestConfig::from_toml("").unwrap();
        assert_eq!(config, BacktestConfig::default());
        assert_eq!(config.data.period_hours, 12);
        assert_eq!(config.strategy.top_k, 4);
        assert_eq!(config.strategy.cost_rate, 0.0005);
        assert_eq!(config.lookback_range(), LookbackRange::new(10, 199).unwrap());
        assert_eq!(config.walk_forward.split_fraction, 0.75);
        assert_eq!(config.periods_per_year(), 730.0);
        assert_eq!(config.output.dir, PathBuf::from("backtest_results"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = BacktestConfig::from_toml(
            r#"
            [data]
            period_hours = 24

            [sweep]
            lookback_max = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.data.period_hours, 24);
        assert_eq!(config.periods_per_year(), 365.0);
        assert_eq!(config.sweep.lookback_min, 10);
        assert_eq!(config.sweep.lookback_max, 60);
        assert!(config.sweep.parallel);
    }

    #[test]
    fn periods_per_year_override() {
        let config = BacktestConfig::from_toml(
            "[walk_forward]\nperiods_per_year = 252.0\n",
        )
        .unwrap();
        assert_eq!(config.periods_per_year(), 252.0);
        assert_eq!(config.sweep_config().periods_per_year, 252.0);
    }

    #[test]
    fn rejects_bad_values() {
        for doc in [
            "[walk_forward]\nsplit_fraction = 1.0\n",
            "[walk_forward]\nsplit_fraction = 0.0\n",
            "[strategy]\ntop_k = 0\n",
            "[strategy]\ncost_rate = -0.1\n",
            "[sweep]\nlookback_min = 0\n",
            "[sweep]\nlookback_min = 50\nlookback_max = 20\n",
            "[data]\nperiod_hours = 0\n",
        ] {
            assert!(
                matches!(BacktestConfig::from_toml(doc), Err(ConfigError::Invalid(_))),
                "accepted: {doc}"
            );
        }
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(matches!(
            BacktestConfig::from_toml("[strategy]\ntop_k = \"four\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_names_path() {
        let err = BacktestConfig::from_file("/nonexistent/xsmom.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/xsmom.toml"));
    }

    #[test]
    fn strategy_carries_shared_parameters() {
        let config = BacktestConfig::default();
        let s = config.strategy(42);
        assert_eq!(s.lookback, 42);
        assert_eq!(s.top_k, 4);
        assert_eq!(s.period_hours, 12);
        assert_eq!(s, config.sweep_config().strategy(42));
    }

    #[test]
    fn run_id_deterministic_and_sensitive() {
        let a = BacktestConfig::default();
        let mut b = a.clone();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        b.strategy.top_k = 3;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
    }
}

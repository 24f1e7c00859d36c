//! Price loading for the runner.
//!
//! Resolves a [`PriceSpec`] to a validated [`PriceTable`] through one of the
//! core providers. Fallback policy for cached datasets:
//! 1. If the dataset is cached → use it
//! 2. If not cached and `synthetic_fallback` → generate synthetic prices (tagged)
//! 3. Otherwise → fail with a hint to import the data first
//!
//! Synthetic prices are a developer-only debug mode. Every result built on
//! them carries `has_synthetic = true`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use xsmom_core::data::{
    CacheProvider, CsvProvider, DataSource, FetchResult, PanelCache, PanelMeta, PriceProvider,
    SyntheticProvider, DEFAULT_UNIVERSE,
};
use xsmom_core::domain::PriceTable;
use xsmom_core::DataError;

use crate::config::BacktestConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "no cached dataset '{name}' (import one with `xsmom cache import {name} --prices FILE`, or pass --synthetic)"
    )]
    NoCachedData { name: String },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Where prices come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceSpec {
    /// Wide CSV file of raw quotes, resampled on load.
    Csv(PathBuf),
    /// Dataset previously imported into the Parquet cache.
    Dataset(String),
    /// Deterministic synthetic panel.
    Synthetic,
}

/// Options controlling how prices are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub period_hours: u32,
    pub cache_dir: PathBuf,
    /// Generate synthetic prices when a dataset is not cached.
    pub synthetic_fallback: bool,
    pub synthetic_rows: usize,
    pub synthetic_seed: String,
    /// Synthetic universe; empty means [`DEFAULT_UNIVERSE`].
    pub assets: Vec<String>,
}

impl LoadOptions {
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            period_hours: config.data.period_hours,
            cache_dir: config.data.cache_dir.clone(),
            synthetic_fallback: false,
            synthetic_rows: config.data.synthetic_rows,
            synthetic_seed: config.data.synthetic_seed.clone(),
            assets: config.data.assets.clone(),
        }
    }

    pub fn cache(&self) -> PanelCache {
        PanelCache::new(&self.cache_dir)
    }

    fn synthetic_provider(&self) -> SyntheticProvider {
        let assets = if self.assets.is_empty() {
            DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect()
        } else {
            self.assets.clone()
        };
        SyntheticProvider {
            assets,
            rows: self.synthetic_rows,
            period_hours: self.period_hours,
            seed: self.synthetic_seed.clone(),
        }
    }
}

/// Loaded prices with provenance.
#[derive(Debug, Clone)]
pub struct LoadedPrices {
    pub table: PriceTable,
    pub source: DataSource,
    /// BLAKE3 over asset ids, timestamps and prices.
    pub dataset_hash: String,
    pub has_synthetic: bool,
    /// Periods dropped during resampling because an asset had no quote.
    pub dropped_buckets: usize,
}

impl From<FetchResult> for LoadedPrices {
    fn from(fetched: FetchResult) -> Self {
        Self {
            dataset_hash: fetched.table.content_hash(),
            has_synthetic: fetched.source == DataSource::Synthetic,
            dropped_buckets: fetched.dropped_buckets,
            source: fetched.source,
            table: fetched.table,
        }
    }
}

/// Load prices for one run.
pub fn load_prices(spec: &PriceSpec, opts: &LoadOptions) -> Result<LoadedPrices, LoadError> {
    let fetched = match spec {
        PriceSpec::Csv(path) => CsvProvider::new(path, opts.period_hours).fetch()?,
        PriceSpec::Synthetic => opts.synthetic_provider().fetch()?,
        PriceSpec::Dataset(name) => {
            match CacheProvider::new(opts.cache(), name.as_str()).fetch() {
                Ok(fetched) => fetched,
                Err(DataError::NoCachedData { .. }) if opts.synthetic_fallback => {
                    tracing::warn!(dataset = %name, "dataset not cached, falling back to synthetic prices");
                    opts.synthetic_provider().fetch()?
                }
                Err(DataError::NoCachedData { name }) => {
                    return Err(LoadError::NoCachedData { name })
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let loaded = LoadedPrices::from(fetched);
    tracing::info!(
        source = %loaded.source,
        rows = loaded.table.len(),
        assets = loaded.table.width(),
        dropped_buckets = loaded.dropped_buckets,
        hash = %&loaded.dataset_hash[..12],
        "prices loaded"
    );
    Ok(loaded)
}

/// Resample a CSV file and store it in the cache under `name`.
pub fn import_csv(
    path: impl AsRef<Path>,
    name: &str,
    opts: &LoadOptions,
) -> Result<PanelMeta, LoadError> {
    let fetched = CsvProvider::new(path.as_ref(), opts.period_hours).fetch()?;
    let meta = opts.cache().write(name, &fetched.table, DataSource::CsvImport)?;
    tracing::info!(
        dataset = name,
        rows = meta.row_count,
        dropped_buckets = fetched.dropped_buckets,
        "csv imported into cache"
    );
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(dir: &Path) -> LoadOptions {
        LoadOptions {
            period_hours: 12,
            cache_dir: dir.to_path_buf(),
            synthetic_fallback: false,
            synthetic_rows: 40,
            synthetic_seed: "loader".into(),
            assets: vec!["A".into(), "B".into(), "C".into()],
        }
    }

    fn write_csv(dir: &Path) -> PathBuf {
        let mut csv = String::from("timestamp,A,B\n");
        for h in 0..48 {
            csv.push_str(&format!(
                "2024-05-{:02} {:02}:00:00,{},{}\n",
                1 + h / 24,
                h % 24,
                10.0 + h as f64,
                20.0 + 0.5 * h as f64
            ));
        }
        let path = dir.join("prices.csv");
        std::fs::write(&path, csv).unwrap();
        path
    }

    #[test]
    fn synthetic_is_tagged_and_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let a = load_prices(&PriceSpec::Synthetic, &opts(dir.path())).unwrap();
        let b = load_prices(&PriceSpec::Synthetic, &opts(dir.path())).unwrap();
        assert!(a.has_synthetic);
        assert_eq!(a.source, DataSource::Synthetic);
        assert_eq!(a.table.len(), 40);
        assert_eq!(a.table.assets(), &["A", "B", "C"]);
        assert_eq!(a.dataset_hash, b.dataset_hash);
    }

    #[test]
    fn empty_universe_uses_default_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let mut o = opts(dir.path());
        o.assets.clear();
        let loaded = load_prices(&PriceSpec::Synthetic, &o).unwrap();
        assert_eq!(loaded.table.width(), DEFAULT_UNIVERSE.len());
    }

    #[test]
    fn csv_loads_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path());
        let loaded = load_prices(&PriceSpec::Csv(path), &opts(dir.path())).unwrap();
        assert_eq!(loaded.table.len(), 4);
        assert!(!loaded.has_synthetic);
        assert_eq!(loaded.source, DataSource::CsvImport);
        // last hourly quote of the first 12-hour bucket
        assert_eq!(loaded.table.row(0).unwrap(), &[21.0, 25.5]);
    }

    #[test]
    fn import_then_load_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path());
        let o = opts(dir.path());
        let meta = import_csv(&path, "may", &o).unwrap();
        assert_eq!(meta.row_count, 4);

        let from_cache = load_prices(&PriceSpec::Dataset("may".into()), &o).unwrap();
        let from_csv = load_prices(&PriceSpec::Csv(path), &o).unwrap();
        assert_eq!(from_cache.source, DataSource::Cache);
        assert_eq!(from_cache.dataset_hash, from_csv.dataset_hash);
    }

    #[test]
    fn missing_dataset_errors_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_prices(&PriceSpec::Dataset("nope".into()), &opts(dir.path())).unwrap_err();
        assert!(matches!(err, LoadError::NoCachedData { ref name } if name == "nope"));
        assert!(err.to_string().contains("xsmom cache import nope"));
    }

    #[test]
    fn missing_dataset_falls_back_to_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let mut o = opts(dir.path());
        o.synthetic_fallback = true;
        let loaded = load_prices(&PriceSpec::Dataset("nope".into()), &o).unwrap();
        assert!(loaded.has_synthetic);
    }
}

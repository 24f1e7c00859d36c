//! Price providers — where a `PriceTable` comes from.
//!
//! A provider hands back a fully validated, resampled table. Network
//! acquisition is out of scope: the providers here read a wide CSV export,
//! the local Parquet cache, or generate a synthetic panel.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::cache::PanelCache;
use super::csv_io::read_price_csv;
use super::synthetic::synthetic_panel;
use crate::domain::PriceTable;
use crate::error::DataError;

/// One raw price observation before resampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: NaiveDateTime,
    pub asset: String,
    pub price: f64,
}

impl Quote {
    pub fn new(timestamp: NaiveDateTime, asset: impl Into<String>, price: f64) -> Self {
        Self {
            timestamp,
            asset: asset.into(),
            price,
        }
    }
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    CsvImport,
    Cache,
    Synthetic,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::CsvImport => write!(f, "csv"),
            DataSource::Cache => write!(f, "cache"),
            DataSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub table: PriceTable,
    pub source: DataSource,
    /// Periods dropped during resampling because an asset had no quote.
    pub dropped_buckets: usize,
}

/// Anything that can produce a validated price table.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<FetchResult, DataError>;
}

/// Wide CSV export (timestamp column + one column per asset).
pub struct CsvProvider {
    path: PathBuf,
    period_hours: u32,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>, period_hours: u32) -> Self {
        Self {
            path: path.into(),
            period_hours,
        }
    }
}

impl PriceProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self) -> Result<FetchResult, DataError> {
        let outcome = read_price_csv(&self.path, self.period_hours)?;
        Ok(FetchResult {
            table: outcome.table,
            source: DataSource::CsvImport,
            dropped_buckets: outcome.dropped_buckets,
        })
    }
}

/// A dataset previously imported into the Parquet cache.
pub struct CacheProvider {
    cache: PanelCache,
    dataset: String,
}

impl CacheProvider {
    pub fn new(cache: PanelCache, dataset: impl Into<String>) -> Self {
        Self {
            cache,
            dataset: dataset.into(),
        }
    }
}

impl PriceProvider for CacheProvider {
    fn name(&self) -> &str {
        "cache"
    }

    fn fetch(&self) -> Result<FetchResult, DataError> {
        Ok(FetchResult {
            table: self.cache.load(&self.dataset)?,
            source: DataSource::Cache,
            dropped_buckets: 0,
        })
    }
}

/// Deterministic synthetic random walks. Developer mode only.
pub struct SyntheticProvider {
    pub assets: Vec<String>,
    pub rows: usize,
    pub period_hours: u32,
    pub seed: String,
}

impl PriceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self) -> Result<FetchResult, DataError> {
        tracing::warn!(
            assets = self.assets.len(),
            rows = self.rows,
            "generating synthetic prices; results will be tagged as synthetic"
        );
        Ok(FetchResult {
            table: synthetic_panel(&self.assets, self.rows, self.period_hours, &self.seed)?,
            source: DataSource::Synthetic,
            dropped_buckets: 0,
        })
    }
}

//! Parquet panel cache.
//!
//! Layout: `{cache_dir}/dataset={NAME}/panel.parquet` plus `meta.json`.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity check on load (schema, row count, BLAKE3 hash vs. sidecar)
//! - Quarantine for corrupt files (`panel.parquet.quarantined`)
//!
//! The Parquet file holds a `timestamp_ms` Int64 column (UTC epoch millis)
//! followed by one Float64 column per asset, in table column order.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::provider::DataSource;
use crate::domain::PriceTable;
use crate::error::DataError;

/// Name of the time column in cached Parquet files.
pub const TIMESTAMP_COLUMN: &str = "timestamp_ms";

const PANEL_FILE: &str = "panel.parquet";
const META_FILE: &str = "meta.json";

/// Metadata sidecar for a cached dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelMeta {
    pub name: String,
    pub assets: Vec<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub row_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: NaiveDateTime,
}

/// The Parquet cache.
#[derive(Debug, Clone)]
pub struct PanelCache {
    cache_dir: PathBuf,
}

impl PanelCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn dataset_dir(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("dataset={name}"))
    }

    fn panel_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join(PANEL_FILE)
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join(META_FILE)
    }

    /// Store `table` under `name`, replacing any previous version.
    pub fn write(
        &self,
        name: &str,
        table: &PriceTable,
        source: DataSource,
    ) -> Result<PanelMeta, DataError> {
        validate_name(name)?;
        let dir = self.dataset_dir(name);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::Cache(format!("failed to create {}: {e}", dir.display())))?;

        let mut df = table_to_dataframe(table)?;
        let path = self.panel_path(name);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache(format!("atomic rename failed: {e}"))
        })?;

        let meta = PanelMeta {
            name: name.to_string(),
            assets: table.assets().to_vec(),
            start: table.first_timestamp(),
            end: table.last_timestamp(),
            row_count: table.len(),
            data_hash: table.content_hash(),
            source,
            cached_at: chrono::Utc::now().naive_utc(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Cache(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(name);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, json).map_err(|e| DataError::Cache(format!("meta write: {e}")))?;
        fs::rename(&meta_tmp, &meta_path)
            .map_err(|e| DataError::Cache(format!("meta rename: {e}")))?;

        tracing::info!(dataset = name, rows = meta.row_count, assets = meta.assets.len(), "cached price panel");
        Ok(meta)
    }

    /// Load a cached dataset. A file that fails validation is quarantined.
    pub fn load(&self, name: &str) -> Result<PriceTable, DataError> {
        let path = self.panel_path(name);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                name: name.to_string(),
            });
        }

        let loaded = load_parquet(&path).and_then(|table| {
            match self.get_meta(name) {
                Some(meta) if meta.data_hash != table.content_hash() => Err(DataError::Validation(
                    "data hash does not match meta.json".into(),
                )),
                _ => Ok(table),
            }
        });

        loaded.map_err(|e| {
            let quarantine = path.with_extension("parquet.quarantined");
            tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
            match fs::rename(&path, &quarantine) {
                Ok(()) => DataError::Cache(format!(
                    "dataset '{name}' was corrupt and has been quarantined: {e}"
                )),
                Err(io) => DataError::Cache(format!(
                    "dataset '{name}' is corrupt ({e}) and could not be quarantined: {io}"
                )),
            }
        })
    }

    pub fn get_meta(&self, name: &str) -> Option<PanelMeta> {
        let content = fs::read_to_string(self.meta_path(name)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Metadata of every cached dataset, sorted by name.
    pub fn list(&self) -> Result<Vec<PanelMeta>, DataError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let mut metas = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix("dataset="))
            else {
                continue;
            };
            if let Some(meta) = self.get_meta(name) {
                metas.push(meta);
            }
        }
        metas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(metas)
    }

    /// Delete a dataset. Returns `false` if nothing was cached under `name`.
    pub fn remove(&self, name: &str) -> Result<bool, DataError> {
        validate_name(name)?;
        let dir = self.dataset_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        Ok(true)
    }
}

fn validate_name(name: &str) -> Result<(), DataError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && name != "."
        && name != "..";
    if ok {
        Ok(())
    } else {
        Err(DataError::Cache(format!(
            "invalid dataset name '{name}' (use letters, digits, '-', '_', '.')"
        )))
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn table_to_dataframe(table: &PriceTable) -> Result<DataFrame, DataError> {
    let millis: Vec<i64> = table
        .timestamps()
        .iter()
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();

    let mut columns = Vec::with_capacity(table.width() + 1);
    columns.push(Column::new(TIMESTAMP_COLUMN.into(), millis));
    for (col, asset) in table.assets().iter().enumerate() {
        if asset == TIMESTAMP_COLUMN {
            return Err(DataError::Cache(format!(
                "asset name '{TIMESTAMP_COLUMN}' is reserved"
            )));
        }
        let values = table.column(col).unwrap_or_default();
        columns.push(Column::new(asset.as_str().into(), values));
    }

    DataFrame::new(columns).map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path).map_err(|e| DataError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_parquet(path: &Path) -> Result<PriceTable, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::Parquet(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::Validation("empty parquet file".into()));
    }

    let ts_ca = df
        .column(TIMESTAMP_COLUMN)
        .map_err(|_| DataError::Validation(format!("missing column '{TIMESTAMP_COLUMN}'")))?
        .i64()
        .map_err(|e| DataError::Parquet(format!("{TIMESTAMP_COLUMN} column type: {e}")))?;

    let n = df.height();
    let mut timestamps = Vec::with_capacity(n);
    for i in 0..n {
        let ms = ts_ca
            .get(i)
            .ok_or_else(|| DataError::Parquet(format!("null timestamp at row {i}")))?;
        let ts = DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| DataError::Parquet(format!("timestamp {ms} out of range")))?
            .naive_utc();
        timestamps.push(ts);
    }

    let mut assets = Vec::new();
    let mut rows = vec![Vec::new(); n];
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == TIMESTAMP_COLUMN {
            continue;
        }
        let ca = column
            .f64()
            .map_err(|e| DataError::Parquet(format!("column '{name}' type: {e}")))?;
        for (i, row) in rows.iter_mut().enumerate() {
            let price = ca
                .get(i)
                .ok_or_else(|| DataError::Parquet(format!("null price for '{name}' at row {i}")))?;
            row.push(price);
        }
        assets.push(name.to_string());
    }

    PriceTable::new(timestamps, assets, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> PriceTable {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        PriceTable::new(
            (0..4).map(|i| t0 + chrono::Duration::hours(12 * i)).collect(),
            vec!["BTCUSDT".into(), "ETHUSDT".into()],
            vec![
                vec![42000.5, 2200.25],
                vec![42100.0, 2210.0],
                vec![41900.75, 2190.5],
                vec![43000.0, 2250.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        let table = sample();

        let meta = cache.write("binance-12h", &table, DataSource::CsvImport).unwrap();
        assert_eq!(meta.row_count, 4);
        assert_eq!(meta.data_hash, table.content_hash());

        let loaded = cache.load("binance-12h").unwrap();
        assert_eq!(loaded, table);
        assert!(!dir
            .path()
            .join("dataset=binance-12h/panel.parquet.tmp")
            .exists());
    }

    #[test]
    fn load_missing_is_no_cached_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        assert!(matches!(
            cache.load("nothing"),
            Err(DataError::NoCachedData { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        cache.write("bad", &sample(), DataSource::CsvImport).unwrap();

        let path = dir.path().join("dataset=bad/panel.parquet");
        fs::write(&path, b"not a parquet file").unwrap();

        assert!(matches!(cache.load("bad"), Err(DataError::Cache(_))));
        assert!(!path.exists());
        assert!(dir
            .path()
            .join("dataset=bad/panel.parquet.quarantined")
            .exists());
    }

    #[test]
    fn list_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        cache.write("zeta", &sample(), DataSource::Synthetic).unwrap();
        cache.write("alpha", &sample(), DataSource::CsvImport).unwrap();

        let names: Vec<String> = cache.list().unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        assert!(cache.remove("zeta").unwrap());
        assert!(!cache.remove("zeta").unwrap());
        assert_eq!(cache.list().unwrap().len(), 1);
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PanelCache::new(dir.path());
        assert!(cache.write("../escape", &sample(), DataSource::CsvImport).is_err());
        assert!(cache.remove("..").is_err());
    }
}

//! PriceTable — the validated price panel every backtest starts from.
//!
//! Invariants checked at construction:
//! - at least one asset, no duplicate identifiers
//! - at least one row, one cell per asset in every row
//! - timestamps strictly increasing
//! - every price finite and > 0 (no missing cells)
//!
//! Gaps in the time axis are allowed: periods with a missing quote are dropped
//! upstream, never imputed.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::panel::Panel;
use crate::error::DataError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Panel<f64>", into = "Panel<f64>")]
pub struct PriceTable {
    panel: Panel<f64>,
}

impl PriceTable {
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        assets: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        if assets.is_empty() {
            return Err(DataError::Validation("price table has no assets".into()));
        }
        let mut seen = HashSet::with_capacity(assets.len());
        for asset in &assets {
            if asset.trim().is_empty() {
                return Err(DataError::Validation("empty asset identifier".into()));
            }
            if !seen.insert(asset.as_str()) {
                return Err(DataError::Validation(format!(
                    "duplicate asset identifier '{asset}'"
                )));
            }
        }
        if rows.is_empty() {
            return Err(DataError::Validation("price table has no rows".into()));
        }
        if let Some(w) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(DataError::Validation(format!(
                "timestamps not strictly increasing at row {}: {} then {}",
                w + 1,
                timestamps[w],
                timestamps[w + 1]
            )));
        }
        for (i, row) in rows.iter().enumerate() {
            if let Some((j, p)) = row
                .iter()
                .enumerate()
                .find(|(_, p)| !p.is_finite() || **p <= 0.0)
            {
                let asset = assets.get(j).map(String::as_str).unwrap_or("?");
                return Err(DataError::Validation(format!(
                    "invalid price {p} for '{asset}' at row {i}"
                )));
            }
        }

        let panel = Panel::new(timestamps, assets, rows)
            .map_err(|e| DataError::Validation(e.to_string()))?;
        Ok(Self { panel })
    }

    pub fn panel(&self) -> &Panel<f64> {
        &self.panel
    }

    pub fn len(&self) -> usize {
        self.panel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panel.is_empty()
    }

    pub fn width(&self) -> usize {
        self.panel.width()
    }

    pub fn assets(&self) -> &[String] {
        self.panel.assets()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        self.panel.timestamps()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        self.panel.rows()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.panel.row(index)
    }

    pub fn column(&self, col: usize) -> Option<Vec<f64>> {
        self.panel.column(col)
    }

    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.panel.timestamps()[0]
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.panel.timestamps()[self.panel.len() - 1]
    }

    /// Chronological sub-table of rows `[start, end)`.
    ///
    /// Returns `None` if the range is empty after clamping.
    pub fn slice(&self, start: usize, end: usize) -> Option<Self> {
        let panel = self.panel.slice_rows(start, end);
        if panel.is_empty() {
            None
        } else {
            Some(Self { panel })
        }
    }

    /// The most recent `n` rows (the whole table if `n >= len`).
    pub fn tail(&self, n: usize) -> Self {
        let n = n.max(1).min(self.len());
        Self {
            panel: self.panel.slice_rows(self.len() - n, self.len()),
        }
    }

    /// BLAKE3 over asset ids, timestamps and prices in column order.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for asset in self.assets() {
            hasher.update(asset.as_bytes());
            hasher.update(&[0u8]);
        }
        for (ts, row) in self.panel.iter() {
            hasher.update(&ts.and_utc().timestamp_millis().to_le_bytes());
            for p in row {
                hasher.update(&p.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl TryFrom<Panel<f64>> for PriceTable {
    type Error = DataError;

    fn try_from(panel: Panel<f64>) -> Result<Self, Self::Error> {
        PriceTable::new(
            panel.timestamps().to_vec(),
            panel.assets().to_vec(),
            panel.rows().to_vec(),
        )
    }
}

impl From<PriceTable> for Panel<f64> {
    fn from(table: PriceTable) -> Self {
        table.panel
    }
}

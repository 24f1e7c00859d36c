//! Time-by-asset panels.
//!
//! A `Panel<T>` is a row-major table: one row per timestamp, one column per
//! asset. Return, rank and position panels are all `Panel`s with different cell
//! types. Panels are value objects: every pipeline step builds a new one.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Row-major time x asset table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Panel<T> {
    timestamps: Vec<NaiveDateTime>,
    assets: Vec<String>,
    rows: Vec<Vec<T>>,
}

/// Period-over-period fractional returns.
pub type ReturnPanel = Panel<f64>;

/// Cross-sectional ranks, 1 = strongest trailing return.
pub type RankPanel = Panel<usize>;

/// Signed portfolio weights per asset.
pub type PositionPanel = Panel<f64>;

impl<T> Panel<T> {
    /// Build a panel, checking that every row has one cell per asset and that
    /// there is one timestamp per row.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        assets: Vec<String>,
        rows: Vec<Vec<T>>,
    ) -> Result<Self, EngineError> {
        if timestamps.len() != rows.len() {
            return Err(EngineError::Misaligned(format!(
                "{} timestamps for {} rows",
                timestamps.len(),
                rows.len()
            )));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != assets.len())
        {
            return Err(EngineError::Misaligned(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                assets.len()
            )));
        }
        Ok(Self::from_parts(timestamps, assets, rows))
    }

    /// Shape is guaranteed by the caller (internal pipeline steps).
    pub(crate) fn from_parts(
        timestamps: Vec<NaiveDateTime>,
        assets: Vec<String>,
        rows: Vec<Vec<T>>,
    ) -> Self {
        debug_assert_eq!(timestamps.len(), rows.len());
        debug_assert!(rows.iter().all(|r| r.len() == assets.len()));
        Self {
            timestamps,
            assets,
            rows,
        }
    }

    /// Number of rows (timestamps).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns (assets).
    pub fn width(&self) -> usize {
        self.assets.len()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn rows(&self) -> &[Vec<T>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[T]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Column index of an asset identifier.
    pub fn asset_index(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    /// Iterate `(timestamp, row)` pairs in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &[T])> {
        self.timestamps
            .iter()
            .zip(self.rows.iter().map(Vec::as_slice))
    }

    /// Cell-wise transform producing a panel of the same shape.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Panel<U> {
        Panel {
            timestamps: self.timestamps.clone(),
            assets: self.assets.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(&mut f).collect())
                .collect(),
        }
    }

    /// Row index of an exact timestamp (timestamps are sorted).
    pub fn position_of(&self, ts: &NaiveDateTime) -> Option<usize> {
        self.timestamps.binary_search(ts).ok()
    }
}

impl<T: Clone> Panel<T> {
    /// All values of one column in time order.
    pub fn column(&self, col: usize) -> Option<Vec<T>> {
        if col >= self.assets.len() {
            return None;
        }
        Some(self.rows.iter().map(|r| r[col].clone()).collect())
    }

    /// Rows `[start, end)`, clamped to the panel.
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.rows.len());
        let start = start.min(end);
        Self {
            timestamps: self.timestamps[start..end].to_vec(),
            assets: self.assets.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }
}

/// A single time series, e.g. the portfolio's per-period net return.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

impl ReturnSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(i: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::hours(12 * i as i64)
    }

    fn sample() -> Panel<f64> {
        Panel::new(
            vec![ts(0), ts(1), ts(2)],
            vec!["A".into(), "B".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Panel::new(
            vec![ts(0), ts(1)],
            vec!["A".into(), "B".into()],
            vec![vec![1.0, 2.0], vec![3.0]],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Misaligned(_)));
    }

    #[test]
    fn new_rejects_timestamp_count_mismatch() {
        let err = Panel::<f64>::new(vec![ts(0)], vec!["A".into()], vec![]).unwrap_err();
        assert!(matches!(err, EngineError::Misaligned(_)));
    }

    #[test]
    fn column_and_get() {
        let p = sample();
        assert_eq!(p.column(1).unwrap(), vec![2.0, 4.0, 6.0]);
        assert_eq!(p.get(2, 0), Some(&5.0));
        assert!(p.column(2).is_none());
        assert_eq!(p.asset_index("B"), Some(1));
    }

    #[test]
    fn map_keeps_shape() {
        let doubled = sample().map(|v| v * 2.0);
        assert_eq!(doubled.len(), 3);
        assert_eq!(doubled.row(1).unwrap(), &[6.0, 8.0]);
        assert_eq!(doubled.timestamps(), sample().timestamps());
    }

    #[test]
    fn slice_rows_clamps() {
        let p = sample();
        let s = p.slice_rows(1, 10);
        assert_eq!(s.len(), 2);
        assert_eq!(s.timestamps()[0], ts(1));
        assert!(p.slice_rows(5, 2).is_empty());
    }

    #[test]
    fn position_of_finds_timestamp() {
        let p = sample();
        assert_eq!(p.position_of(&ts(2)), Some(2));
        assert_eq!(p.position_of(&ts(7)), None);
    }
}

//! Quote resampling — raw observations to one row per fixed period.
//!
//! Bucket = `floor(epoch_seconds / period_seconds)`, labelled by its start
//! time. Each bucket keeps the latest quote of every asset (last value in the
//! period). A bucket in which any asset has no quote is dropped, never filled.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};

use super::provider::Quote;
use crate::domain::PriceTable;
use crate::error::DataError;

/// A resampled table plus how much was thrown away getting there.
#[derive(Debug, Clone)]
pub struct ResampleOutcome {
    pub table: PriceTable,
    /// Periods with at least one quote but not one for every asset.
    pub dropped_buckets: usize,
}

/// Resample quotes; the asset universe is every asset seen, in order of
/// first appearance.
pub fn resample_quotes(quotes: &[Quote], period_hours: u32) -> Result<ResampleOutcome, DataError> {
    let mut assets: Vec<String> = Vec::new();
    for q in quotes {
        if !assets.contains(&q.asset) {
            assets.push(q.asset.clone());
        }
    }
    resample_with_universe(quotes, &assets, period_hours)
}

/// Resample quotes onto a fixed asset universe (column order preserved).
///
/// A quote for an asset outside `assets` is a validation error.
pub fn resample_with_universe(
    quotes: &[Quote],
    assets: &[String],
    period_hours: u32,
) -> Result<ResampleOutcome, DataError> {
    if period_hours == 0 {
        return Err(DataError::Validation(
            "resample period must be >= 1 hour".into(),
        ));
    }
    if quotes.is_empty() {
        return Err(DataError::Validation("no quotes to resample".into()));
    }
    let period_secs = i64::from(period_hours) * 3600;

    // bucket -> per-asset (timestamp, price) of the latest quote
    let mut buckets: BTreeMap<i64, Vec<Option<(NaiveDateTime, f64)>>> = BTreeMap::new();
    for q in quotes {
        if !q.price.is_finite() || q.price <= 0.0 {
            return Err(DataError::Validation(format!(
                "invalid price {} for '{}' at {}",
                q.price, q.asset, q.timestamp
            )));
        }
        let col = assets.iter().position(|a| *a == q.asset).ok_or_else(|| {
            DataError::Validation(format!("quote for unknown asset '{}'", q.asset))
        })?;
        let bucket = q.timestamp.and_utc().timestamp().div_euclid(period_secs);
        let slots = buckets
            .entry(bucket)
            .or_insert_with(|| vec![None; assets.len()]);
        match slots[col] {
            Some((seen, _)) if seen > q.timestamp => {}
            _ => slots[col] = Some((q.timestamp, q.price)),
        }
    }

    let mut timestamps = Vec::with_capacity(buckets.len());
    let mut rows = Vec::with_capacity(buckets.len());
    let mut dropped_buckets = 0;
    for (bucket, slots) in buckets {
        let row: Option<Vec<f64>> = slots.iter().map(|s| s.map(|(_, p)| p)).collect();
        let Some(row) = row else {
            dropped_buckets += 1;
            continue;
        };
        let label = DateTime::from_timestamp(bucket * period_secs, 0)
            .ok_or_else(|| DataError::Validation(format!("bucket {bucket} out of range")))?
            .naive_utc();
        timestamps.push(label);
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(DataError::Validation(format!(
            "no complete {period_hours}h periods: every period is missing at least one asset"
        )));
    }
    if dropped_buckets > 0 {
        tracing::warn!(
            dropped_buckets,
            kept = rows.len(),
            period_hours,
            "dropped incomplete periods during resampling"
        );
    }

    Ok(ResampleOutcome {
        table: PriceTable::new(timestamps, assets.to_vec(), rows)?,
        dropped_buckets,
    })
}

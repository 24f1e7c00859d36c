//! Synthetic price panels for development and tests.
//!
//! Each asset is a geometric random walk with its own drift and volatility,
//! seeded from BLAKE3(seed, asset) so the same inputs always produce the same
//! table. Clearly fake: callers must tag results built on it.

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::PriceTable;
use crate::error::DataError;

/// The ten USDT pairs the daily tool tracks.
pub const DEFAULT_UNIVERSE: [&str; 10] = [
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "ADAUSDT", "AVAXUSDT", "LINKUSDT",
    "DOTUSDT", "TRXUSDT",
];

/// First timestamp of every synthetic table.
pub fn synthetic_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 10, 13)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Generate `rows` periods of prices for `assets`.
pub fn synthetic_panel(
    assets: &[String],
    rows: usize,
    period_hours: u32,
    seed: &str,
) -> Result<PriceTable, DataError> {
    if period_hours == 0 {
        return Err(DataError::Validation(
            "synthetic period must be >= 1 hour".into(),
        ));
    }
    if rows == 0 {
        return Err(DataError::Validation("synthetic panel needs rows".into()));
    }

    let step = chrono::Duration::hours(i64::from(period_hours));
    let start = synthetic_epoch();
    let timestamps: Vec<NaiveDateTime> = (0..rows).map(|i| start + step * i as i32).collect();

    let columns: Vec<Vec<f64>> = assets
        .iter()
        .map(|asset| random_walk(seed, asset, rows))
        .collect();
    let data = (0..rows)
        .map(|i| columns.iter().map(|c| c[i]).collect())
        .collect();

    PriceTable::new(timestamps, assets.to_vec(), data)
}

/// [`synthetic_panel`] over [`DEFAULT_UNIVERSE`].
pub fn synthetic_default(rows: usize, period_hours: u32, seed: &str) -> Result<PriceTable, DataError> {
    let assets: Vec<String> = DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect();
    synthetic_panel(&assets, rows, period_hours, seed)
}

fn random_walk(seed: &str, asset: &str, rows: usize) -> Vec<f64> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(seed.as_bytes());
    hasher.update(&[0u8]);
    hasher.update(asset.as_bytes());
    let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

    let drift: f64 = rng.gen_range(-0.002..0.002);
    let vol: f64 = rng.gen_range(0.005..0.03);
    let mut price: f64 = rng.gen_range(1.0..1000.0);

    let mut out = Vec::with_capacity(rows);
    for _ in 0..rows {
        out.push(price);
        let shock: f64 = rng.gen_range(-1.0..1.0);
        price *= (drift + vol * shock).exp();
    }
    out
}

//! Daily signal extractor — rank only the most recent row.
//!
//! A point read, not a backtest: it sums the last `lookback` returns of every
//! asset and orders them with the same tie-break as [`compute_ranks`], so the
//! latest row of a historical rank panel and this read always agree.
//!
//! [`compute_ranks`]: super::rank::compute_ranks

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::PriceTable;
use crate::error::EngineError;

use super::positions::validate_top_k;
use super::rank::{ranking_order, window_sum};
use super::returns::compute_returns;

/// One asset in the latest cross-section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAsset {
    pub asset: String,
    /// 1 = strongest.
    pub rank: usize,
    /// Trailing `lookback`-period return sum.
    pub score: f64,
}

/// Actionable long/short lists as of the last price row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestSignal {
    pub as_of: NaiveDateTime,
    pub lookback: usize,
    /// Ranks 1..=K, strongest first.
    pub longs: Vec<RankedAsset>,
    /// Ranks N-K+1..=N, in ascending rank order.
    pub shorts: Vec<RankedAsset>,
}

impl LatestSignal {
    pub fn long_assets(&self) -> Vec<&str> {
        self.longs.iter().map(|a| a.asset.as_str()).collect()
    }

    pub fn short_assets(&self) -> Vec<&str> {
        self.shorts.iter().map(|a| a.asset.as_str()).collect()
    }
}

/// Rank the final row of `prices` by trailing `lookback`-period return sum.
pub fn latest_signal(
    prices: &PriceTable,
    lookback: usize,
    top_k: usize,
) -> Result<LatestSignal, EngineError> {
    if lookback == 0 {
        return Err(EngineError::invalid("lookback", "must be >= 1"));
    }
    validate_top_k(prices.width(), top_k)?;
    if prices.len() < lookback + 1 {
        return Err(EngineError::InsufficientData {
            context: "latest signal",
            required: lookback + 1,
            available: prices.len(),
        });
    }

    let recent = prices.tail(lookback + 1);
    let returns = compute_returns(&recent)?;
    let scores = window_sum(returns.rows(), returns.width());
    let order = ranking_order(&scores, prices.assets());

    let ranked: Vec<RankedAsset> = order
        .iter()
        .enumerate()
        .map(|(i, &col)| RankedAsset {
            asset: prices.assets()[col].clone(),
            rank: i + 1,
            score: scores[col],
        })
        .collect();
    let n = ranked.len();

    Ok(LatestSignal {
        as_of: prices.last_timestamp(),
        lookback,
        longs: ranked[..top_k].to_vec(),
        shorts: ranked[n - top_k..].to_vec(),
    })
}

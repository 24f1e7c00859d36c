//! Return engine — price panel to period-over-period fractional returns.

use crate::domain::{Panel, PriceTable, ReturnPanel};
use crate::error::EngineError;

/// Fractional change of every asset from row t-1 to row t.
///
/// The output drops the first price row (no prior reference), so it has
/// `prices.len() - 1` rows labelled with the later timestamp of each pair.
pub fn compute_returns(prices: &PriceTable) -> Result<ReturnPanel, EngineError> {
    if prices.len() < 2 {
        return Err(EngineError::InsufficientData {
            context: "returns",
            required: 2,
            available: prices.len(),
        });
    }

    let rows: Vec<Vec<f64>> = prices
        .rows()
        .windows(2)
        .map(|w| {
            w[0].iter()
                .zip(&w[1])
                .map(|(prev, curr)| (curr - prev) / prev)
                .collect()
        })
        .collect();

    Ok(Panel::from_parts(
        prices.timestamps()[1..].to_vec(),
        prices.assets().to_vec(),
        rows,
    ))
}

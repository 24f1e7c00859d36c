//! Strategy evaluator — returns -> ranks -> positions -> costs.
//!
//! Pure composition. The same inputs always produce the same bits: no
//! randomness, no shared state, no clocks.

use serde::{Deserialize, Serialize};

use crate::domain::{Panel, PositionPanel, PriceTable, ReturnPanel, ReturnSeries, StrategyConfig};
use crate::error::EngineError;

use super::cost_model::CostModel;
use super::positions::compute_positions;
use super::rank::compute_ranks;
use super::returns::compute_returns;

/// Everything one evaluation produces.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evaluation {
    /// Portfolio net return per period.
    pub returns: ReturnSeries,
    /// Asset-level net contributions (columns sum to `returns`).
    pub net: Panel<f64>,
    /// Weights decided at each rank timestamp.
    pub positions: PositionPanel,
    /// Sum of |Δweight| per period of `returns`.
    pub turnover: Vec<f64>,
    /// Sum of |weight| held into each period of `returns`.
    pub gross_exposure: Vec<f64>,
}

impl Evaluation {
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Total turnover cost paid at `rate` over the whole series.
    pub fn total_cost(&self, rate: f64) -> f64 {
        self.turnover.iter().sum::<f64>() * rate
    }
}

/// Run the full pipeline over a price table.
pub fn evaluate(prices: &PriceTable, config: &StrategyConfig) -> Result<Evaluation, EngineError> {
    config.validate()?;
    let returns = compute_returns(prices)?;
    evaluate_from_returns(&returns, config)
}

/// Run ranks, positions and costs over a precomputed return panel.
///
/// The sweep computes returns once per partition and calls this for every
/// candidate lookback.
pub fn evaluate_from_returns(
    returns: &ReturnPanel,
    config: &StrategyConfig,
) -> Result<Evaluation, EngineError> {
    let cost = CostModel::new(config.cost_rate)?;
    let ranks = compute_ranks(returns, config.lookback)?;
    let positions = compute_positions(&ranks, returns.width(), config.top_k)?;
    let net = cost.apply(returns, &positions)?;

    Ok(Evaluation {
        returns: net.portfolio,
        net: net.assets,
        positions,
        turnover: net.turnover,
        gross_exposure: net.gross_exposure,
    })
}

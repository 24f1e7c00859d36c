//! Cost model — lagged position P&L net of turnover cost.
//!
//! For each asset and each position row j >= 1 (timestamp t):
//!
//! `net[t] = ret[t] * pos[j-1] - rate * |pos[j] - pos[j-1]|`
//!
//! The position decided at t-1 earns the period-t return (no look-ahead).
//! Turnover cost lands on the period in which the weight changed. The first
//! position row has no predecessor and is dropped, so a position panel that
//! never changes pays exactly zero cost.

use serde::{Deserialize, Serialize};

use crate::domain::{Panel, PositionPanel, ReturnPanel, ReturnSeries};
use crate::error::EngineError;

/// Linear turnover cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Fraction charged per unit of absolute weight change.
    pub rate: f64,
}

/// Output of the cost model: per-asset and per-portfolio net returns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetReturns {
    /// Asset-level net return contributions.
    pub assets: Panel<f64>,
    /// Row sums of `assets`: the portfolio's per-period return.
    pub portfolio: ReturnSeries,
    /// Sum of |Δweight| per period.
    pub turnover: Vec<f64>,
    /// Sum of |weight| held into each period.
    pub gross_exposure: Vec<f64>,
}

impl CostModel {
    pub fn new(rate: f64) -> Result<Self, EngineError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(EngineError::invalid(
                "cost_rate",
                format!("must be finite and >= 0, got {rate}"),
            ));
        }
        Ok(Self { rate })
    }

    pub fn frictionless() -> Self {
        Self { rate: 0.0 }
    }

    /// Cost of moving from `prev` to `next` weight.
    pub fn turnover_cost(&self, prev: f64, next: f64) -> f64 {
        self.rate * (next - prev).abs()
    }

    /// Apply lagged positions and turnover cost to raw asset returns.
    ///
    /// `positions` must cover a contiguous run of `raw_returns` timestamps
    /// with the same asset columns.
    pub fn apply(
        &self,
        raw_returns: &ReturnPanel,
        positions: &PositionPanel,
    ) -> Result<NetReturns, EngineError> {
        let offset = align(raw_returns, positions)?;
        let width = positions.width();
        let pos_rows = positions.rows();
        let ret_rows = raw_returns.rows();

        let n_out = pos_rows.len().saturating_sub(1);
        let mut timestamps = Vec::with_capacity(n_out);
        let mut asset_rows = Vec::with_capacity(n_out);
        let mut portfolio = Vec::with_capacity(n_out);
        let mut turnover = Vec::with_capacity(n_out);
        let mut gross = Vec::with_capacity(n_out);

        for j in 1..pos_rows.len() {
            let prev = &pos_rows[j - 1];
            let curr = &pos_rows[j];
            let ret = &ret_rows[offset + j];

            let mut row = Vec::with_capacity(width);
            let mut traded = 0.0;
            let mut held = 0.0;
            for a in 0..width {
                row.push(ret[a] * prev[a] - self.turnover_cost(prev[a], curr[a]));
                traded += (curr[a] - prev[a]).abs();
                held += prev[a].abs();
            }

            timestamps.push(positions.timestamps()[j]);
            portfolio.push(row.iter().sum());
            asset_rows.push(row);
            turnover.push(traded);
            gross.push(held);
        }

        Ok(NetReturns {
            assets: Panel::from_parts(timestamps.clone(), positions.assets().to_vec(), asset_rows),
            portfolio: ReturnSeries {
                timestamps,
                values: portfolio,
            },
            turnover,
            gross_exposure: gross,
        })
    }
}

/// Functional form of [`CostModel::apply`].
pub fn apply_costs(
    raw_returns: &ReturnPanel,
    positions: &PositionPanel,
    rate: f64,
) -> Result<NetReturns, EngineError> {
    CostModel::new(rate)?.apply(raw_returns, positions)
}

/// Row offset of `positions` inside `raw_returns`, after checking columns and
/// that the timestamps match row for row.
fn align(raw_returns: &ReturnPanel, positions: &PositionPanel) -> Result<usize, EngineError> {
    if raw_returns.assets() != positions.assets() {
        return Err(EngineError::Misaligned(
            "return and position panels have different asset columns".into(),
        ));
    }
    let Some(first) = positions.timestamps().first() else {
        return Ok(0);
    };
    let offset = raw_returns.position_of(first).ok_or_else(|| {
        EngineError::Misaligned(format!("position timestamp {first} not found in returns"))
    })?;
    let end = offset + positions.len();
    if end > raw_returns.len() || raw_returns.timestamps()[offset..end] != *positions.timestamps()
    {
        return Err(EngineError::Misaligned(
            "position timestamps are not a contiguous run of return timestamps".into(),
        ));
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::hours(12 * i)
    }

    fn panel(start: i64, rows: Vec<Vec<f64>>) -> Panel<f64> {
        let n = rows.len() as i64;
        Panel::new(
            (start..start + n).map(ts).collect(),
            vec!["A".into(), "B".into()],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn lagged_position_earns_next_return() {
        let rets = panel(0, vec![vec![0.0, 0.0], vec![0.10, -0.05], vec![0.02, 0.03]]);
        let pos = panel(0, vec![vec![0.5, -0.5], vec![0.5, -0.5], vec![-0.5, 0.5]]);

        let net = apply_costs(&rets, &pos, 0.0).unwrap();
        assert_eq!(net.portfolio.len(), 2);
        assert_eq!(net.portfolio.timestamps, vec![ts(1), ts(2)]);
        // t=1 uses pos[0]: 0.5*0.10 + (-0.5)*(-0.05) = 0.075
        assert!((net.portfolio.values[0] - 0.075).abs() < 1e-12);
        // t=2 uses pos[1]: 0.5*0.02 - 0.5*0.03 = -0.005
        assert!((net.portfolio.values[1] - (-0.005)).abs() < 1e-12);
    }

    #[test]
    fn cost_charged_on_change_period() {
        let rets = panel(0, vec![vec![0.0, 0.0]; 3]);
        let pos = panel(0, vec![vec![0.5, -0.5], vec![0.5, -0.5], vec![-0.5, 0.5]]);

        let net = apply_costs(&rets, &pos, 0.001).unwrap();
        assert_eq!(net.portfolio.values[0], 0.0);
        // both legs flip by 1.0: cost = 0.001 * 2.0
        assert!((net.portfolio.values[1] - (-0.002)).abs() < 1e-15);
        assert_eq!(net.turnover, vec![0.0, 2.0]);
        assert_eq!(net.gross_exposure, vec![1.0, 1.0]);
    }

    #[test]
    fn constant_positions_cost_nothing() {
        let rets = panel(0, vec![vec![0.01, -0.01]; 6]);
        let pos = panel(0, vec![vec![0.5, -0.5]; 6]);
        let net = apply_costs(&rets, &pos, 0.01).unwrap();
        assert_eq!(net.turnover.iter().sum::<f64>(), 0.0);
        for v in &net.portfolio.values {
            assert!((v - 0.01).abs() < 1e-15);
        }
    }

    #[test]
    fn positions_offset_into_returns() {
        let rets = panel(0, vec![vec![0.0, 0.0], vec![0.0, 0.0], vec![0.2, 0.1], vec![0.1, 0.2]]);
        let pos = panel(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let net = apply_costs(&rets, &pos, 0.0).unwrap();
        assert_eq!(net.portfolio.timestamps, vec![ts(3)]);
        assert!((net.portfolio.values[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn misaligned_positions_rejected() {
        let rets = panel(0, vec![vec![0.0, 0.0]; 2]);
        let pos = panel(5, vec![vec![0.0, 0.0]; 2]);
        assert!(matches!(
            apply_costs(&rets, &pos, 0.0),
            Err(EngineError::Misaligned(_))
        ));

        let pos = panel(1, vec![vec![0.0, 0.0]; 2]);
        assert!(matches!(
            apply_costs(&rets, &pos, 0.0),
            Err(EngineError::Misaligned(_))
        ));
    }

    #[test]
    fn negative_rate_rejected() {
        assert!(CostModel::new(-0.01).is_err());
        assert_eq!(CostModel::frictionless().turnover_cost(0.0, 1.0), 0.0);
    }
}

//! Performance metrics — pure functions over a period-return series.
//!
//! Every metric is a pure function: returns in, scalar out. Annualization uses
//! the caller's periods-per-year (730 for 12-hour periods), never a constant.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use xsmom_core::domain::ReturnSeries;
use xsmom_core::engine::Evaluation;

/// Scalar summary of one partition, plus the series that produced it.
///
/// Ratios can overflow on short partitions (CAGR of a large single-period
/// gain is `inf`); they serialize through [`serde_float::metric`](crate::serde_float::metric).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Partition label (`train`, `test`, `full`).
    pub partition: String,
    pub periods: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    #[serde(with = "crate::serde_float::metric")]
    pub total_return: f64,
    #[serde(with = "crate::serde_float::metric")]
    pub annualized_return: f64,
    #[serde(with = "crate::serde_float::metric")]
    pub annualized_volatility: f64,
    #[serde(with = "crate::serde_float::metric")]
    pub sharpe: f64,
    #[serde(with = "crate::serde_float::metric")]
    pub sortino: f64,
    #[serde(with = "crate::serde_float::metric")]
    pub calmar: f64,
    #[serde(with = "crate::serde_float::metric")]
    pub max_drawdown: f64,
    #[serde(with = "crate::serde_float::metric")]
    pub mean_turnover: f64,
    #[serde(with = "crate::serde_float::metric")]
    pub mean_gross_exposure: f64,
    pub returns: ReturnSeries,
}

impl PerformanceReport {
    /// Compute every metric for one evaluated partition.
    pub fn compute(partition: &str, evaluation: &Evaluation, periods_per_year: f64) -> Self {
        let r = &evaluation.returns.values;
        Self {
            partition: partition.to_string(),
            periods: r.len(),
            start: evaluation.returns.first_timestamp(),
            end: evaluation.returns.last_timestamp(),
            total_return: total_return(r),
            annualized_return: annualized_return(r, periods_per_year),
            annualized_volatility: annualized_volatility(r, periods_per_year),
            sharpe: sharpe_ratio(r, periods_per_year),
            sortino: sortino_ratio(r, periods_per_year),
            calmar: calmar_ratio(r, periods_per_year),
            max_drawdown: max_drawdown(r),
            mean_turnover: mean_f64(&evaluation.turnover),
            mean_gross_exposure: mean_f64(&evaluation.gross_exposure),
            returns: evaluation.returns.clone(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Compounded equity starting at 1.0: one more point than `returns`.
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    let mut equity = 1.0;
    curve.push(equity);
    for r in returns {
        equity *= 1.0 + r;
        curve.push(equity);
    }
    curve
}

/// Π(1 + r) − 1.
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |eq, r| eq * (1.0 + r)) - 1.0
}

/// CAGR: (1 + total)^(P/n) − 1.
///
/// Returns 0.0 for an empty series or a wiped-out equity curve.
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let growth = 1.0 + total_return(returns);
    if growth <= 0.0 {
        return 0.0;
    }
    growth.powf(periods_per_year / returns.len() as f64) - 1.0
}

/// Sample standard deviation scaled by √P.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    std_dev(returns) * periods_per_year.sqrt()
}

/// Annualized Sharpe ratio: mean / std · √P (zero risk-free rate).
///
/// Returns 0.0 if variance is zero or fewer than 2 periods.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    raw_sharpe(returns, periods_per_year).unwrap_or(0.0)
}

/// Sharpe without the zero fallback: `None` when undefined.
pub fn raw_sharpe(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let std = std_dev(returns);
    if !std.is_finite() || std < 1e-15 {
        return None;
    }
    let ratio = mean_f64(returns) / std * periods_per_year.sqrt();
    ratio.is_finite().then_some(ratio)
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside or fewer than 2 periods.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / downside_std * periods_per_year.sqrt()
}

/// Calmar ratio: CAGR / |max_drawdown|.
///
/// Returns 0.0 if there is no drawdown.
pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    let dd = max_drawdown(returns);
    if dd >= 0.0 {
        return 0.0;
    }
    annualized_return(returns, periods_per_year) / dd.abs()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown),
/// measured on the compounded equity curve starting at 1.0.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for eq in equity_curve(returns) {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

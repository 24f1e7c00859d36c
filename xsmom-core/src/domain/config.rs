//! StrategyConfig — the immutable parameter bundle for one evaluation.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Hours in a (365-day) year, used to annualize per-period statistics.
pub const HOURS_PER_YEAR: f64 = 365.0 * 24.0;

/// Parameters of a single cross-sectional momentum evaluation.
///
/// Passed by value into every pipeline step; nothing reads process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Trailing periods summed into the momentum score.
    pub lookback: usize,
    /// Names held per side (long top-K, short bottom-K).
    pub top_k: usize,
    /// Cost charged per unit of absolute weight change.
    pub cost_rate: f64,
    /// Resample period length in hours.
    pub period_hours: u32,
}

impl StrategyConfig {
    pub const DEFAULT_TOP_K: usize = 4;
    pub const DEFAULT_COST_RATE: f64 = 0.0005;
    pub const DEFAULT_PERIOD_HOURS: u32 = 12;

    /// Baseline configuration with the given lookback.
    pub fn baseline(lookback: usize) -> Self {
        Self {
            lookback,
            top_k: Self::DEFAULT_TOP_K,
            cost_rate: Self::DEFAULT_COST_RATE,
            period_hours: Self::DEFAULT_PERIOD_HOURS,
        }
    }

    /// Same configuration with a different lookback.
    pub fn with_lookback(self, lookback: usize) -> Self {
        Self { lookback, ..self }
    }

    /// Checks that do not depend on the data: positivity and finiteness.
    ///
    /// Data-dependent limits (lookback vs. rows, top_k vs. assets) are
    /// checked by the pipeline steps themselves.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.lookback == 0 {
            return Err(EngineError::invalid("lookback", "must be >= 1"));
        }
        if self.top_k == 0 {
            return Err(EngineError::invalid("top_k", "must be >= 1"));
        }
        if !self.cost_rate.is_finite() || self.cost_rate < 0.0 {
            return Err(EngineError::invalid(
                "cost_rate",
                format!("must be finite and >= 0, got {}", self.cost_rate),
            ));
        }
        if self.period_hours == 0 {
            return Err(EngineError::invalid("period_hours", "must be >= 1"));
        }
        Ok(())
    }

    /// Periods per year for this resample period (730 at 12 hours).
    pub fn periods_per_year(&self) -> f64 {
        periods_per_year(self.period_hours)
    }
}

/// `365 * 24 / period_hours`.
pub fn periods_per_year(period_hours: u32) -> f64 {
    HOURS_PER_YEAR / period_hours.max(1) as f64
}

//! Lookback sweep — grid search over the momentum window.
//!
//! Every candidate lookback is evaluated on the same training table and
//! scored by the annualized Sharpe ratio of its net portfolio returns. The
//! winner is the arg-max; equal scores go to the smallest lookback.
//!
//! A candidate that cannot be scored (zero variance, too few periods, or an
//! evaluation error) scores `f64::NEG_INFINITY` and is excluded. The sweep
//! only fails if every candidate is excluded.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use xsmom_core::domain::{PriceTable, ReturnPanel, StrategyConfig};
use xsmom_core::engine::{compute_returns, evaluate_from_returns, validate_top_k};
use xsmom_core::EngineError;

use crate::metrics::raw_sharpe;

// ─── Configuration ───────────────────────────────────────────────────

/// Inclusive range of candidate lookbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackRange {
    pub min: usize,
    pub max: usize,
}

impl LookbackRange {
    pub const DEFAULT_MIN: usize = 10;
    pub const DEFAULT_MAX: usize = 199;

    pub fn new(min: usize, max: usize) -> Result<Self, EngineError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min == 0 {
            return Err(EngineError::InvalidParameter {
                name: "lookback_min",
                reason: "must be >= 1".into(),
            });
        }
        if self.max < self.min {
            return Err(EngineError::InvalidParameter {
                name: "lookback_max",
                reason: format!("{} is below lookback_min {}", self.max, self.min),
            });
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> {
        self.min..=self.max
    }

    pub fn len(&self) -> usize {
        (self.max + 1).saturating_sub(self.min)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LookbackRange {
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}

/// Everything the sweep needs besides the data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub range: LookbackRange,
    pub top_k: usize,
    pub cost_rate: f64,
    pub period_hours: u32,
    /// Annualization factor for the Sharpe score.
    pub periods_per_year: f64,
}

impl SweepConfig {
    /// Strategy configuration for one candidate.
    pub fn strategy(&self, lookback: usize) -> StrategyConfig {
        StrategyConfig {
            lookback,
            top_k: self.top_k,
            cost_rate: self.cost_rate,
            period_hours: self.period_hours,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Score of a single candidate lookback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub lookback: usize,
    /// Annualized Sharpe, or `NEG_INFINITY` when excluded.
    #[serde(with = "crate::serde_float")]
    pub score: f64,
    /// Net return periods the score was computed over.
    pub periods: usize,
    /// Why the candidate could not be evaluated, if it failed.
    pub error: Option<String>,
}

impl CandidateOutcome {
    pub fn is_viable(&self) -> bool {
        self.score.is_finite()
    }
}

/// Outcome of a full sweep, candidates in ascending lookback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub candidates: Vec<CandidateOutcome>,
    pub best_lookback: usize,
    pub best_score: f64,
}

impl SweepResult {
    /// Lookback -> score mapping.
    pub fn scores(&self) -> BTreeMap<usize, f64> {
        self.candidates.iter().map(|c| (c.lookback, c.score)).collect()
    }

    /// Number of candidates that scored `NEG_INFINITY`.
    pub fn excluded(&self) -> usize {
        self.candidates.iter().filter(|c| !c.is_viable()).count()
    }

    /// Candidates sorted by score (descending), ties by lookback.
    pub fn ranked(&self) -> Vec<&CandidateOutcome> {
        let mut sorted: Vec<_> = self.candidates.iter().collect();
        sorted.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.lookback.cmp(&b.lookback))
        });
        sorted
    }
}

// ─── Sweep executor ──────────────────────────────────────────────────

/// Lookback sweep executor, parallel by default.
pub struct LookbackSweep {
    config: SweepConfig,
    parallel: bool,
}

impl LookbackSweep {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Sweep every lookback in the range over `prices`.
    pub fn run(&self, prices: &PriceTable) -> Result<SweepResult, EngineError> {
        self.run_with_progress(prices, |_, _, _| {})
    }

    /// Sweep with a callback after each candidate: `(index, total, outcome)`.
    ///
    /// In parallel mode the callback fires in completion order.
    pub fn run_with_progress<F>(
        &self,
        prices: &PriceTable,
        progress: F,
    ) -> Result<SweepResult, EngineError>
    where
        F: Fn(usize, usize, &CandidateOutcome) + Send + Sync,
    {
        self.config.range.validate()?;
        validate_top_k(prices.width(), self.config.top_k)?;
        let returns = compute_returns(prices)?;
        let lookbacks: Vec<usize> = self.config.range.iter().collect();
        let total = lookbacks.len();

        let run_one = |(idx, lookback): (usize, &usize)| {
            let outcome = self.score_candidate(&returns, *lookback);
            progress(idx, total, &outcome);
            outcome
        };
        let candidates: Vec<CandidateOutcome> = if self.parallel {
            lookbacks.par_iter().enumerate().map(run_one).collect()
        } else {
            lookbacks.iter().enumerate().map(run_one).collect()
        };

        let (best_lookback, best_score) =
            select_best(&candidates).ok_or(EngineError::NoViableParameter { candidates: total })?;

        tracing::info!(
            best_lookback,
            best_score,
            candidates = total,
            excluded = candidates.iter().filter(|c| !c.is_viable()).count(),
            "lookback sweep complete"
        );

        Ok(SweepResult {
            candidates,
            best_lookback,
            best_score,
        })
    }

    fn score_candidate(&self, returns: &ReturnPanel, lookback: usize) -> CandidateOutcome {
        match evaluate_from_returns(returns, &self.config.strategy(lookback)) {
            Ok(eval) => {
                let score = score_returns(&eval.returns.values, self.config.periods_per_year);
                tracing::debug!(lookback, score, periods = eval.len(), "candidate scored");
                CandidateOutcome {
                    lookback,
                    score,
                    periods: eval.len(),
                    error: None,
                }
            }
            Err(e) => {
                tracing::debug!(lookback, error = %e, "candidate excluded");
                CandidateOutcome {
                    lookback,
                    score: f64::NEG_INFINITY,
                    periods: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Annualized Sharpe of a net return series; `NEG_INFINITY` when undefined.
pub fn score_returns(returns: &[f64], periods_per_year: f64) -> f64 {
    raw_sharpe(returns, periods_per_year).unwrap_or(f64::NEG_INFINITY)
}

/// Arg-max over finite scores; the earliest (smallest) lookback wins ties.
///
/// `candidates` must be in ascending lookback order.
pub fn select_best(candidates: &[CandidateOutcome]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for c in candidates.iter().filter(|c| c.is_viable()) {
        match best {
            Some((_, score)) if c.score <= score => {}
            _ => best = Some((c.lookback, c.score)),
        }
    }
    best
}

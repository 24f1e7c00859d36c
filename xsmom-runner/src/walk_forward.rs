//! Walk-forward harness — fit on training rows, report on train/test/full.
//!
//! The panel is split once, chronologically, at `floor(fraction * rows)`.
//! The lookback is chosen by sweeping the training partition only, then
//! applied unchanged to each partition. The daily signal path reuses the
//! same fitting step over the whole table before reading the last row.

use std::fmt;
use std::ops::Range;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xsmom_core::domain::PriceTable;
use xsmom_core::engine::{evaluate, latest_signal, Evaluation, LatestSignal};
use xsmom_core::EngineError;

use crate::metrics::PerformanceReport;
use crate::sweep::{LookbackSweep, SweepConfig, SweepResult};

/// Errors from walk-forward validation.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{partition} partition failed: {source}")]
    Partition {
        partition: Partition,
        source: EngineError,
    },
}

// ─── Split ───────────────────────────────────────────────────────────

/// Row ranges of the two partitions; `train.end == test.start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Split `rows` at `floor(fraction * rows)`. No shuffling: training
/// strictly precedes testing.
pub fn split_chronological(rows: usize, fraction: f64) -> Result<SplitSpec, EngineError> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(EngineError::InvalidParameter {
            name: "split_fraction",
            reason: format!("must be in (0, 1), got {fraction}"),
        });
    }
    let k = (fraction * rows as f64).floor() as usize;
    Ok(SplitSpec {
        train: 0..k,
        test: k..rows,
    })
}

/// Which slice of the panel a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Test,
    Full,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Test, Partition::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
            Partition::Full => "full",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Config and results ──────────────────────────────────────────────

/// Walk-forward parameters: the sweep plus the split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    pub sweep: SweepConfig,
    pub split_fraction: f64,
    /// Run sweep candidates on the rayon pool.
    pub parallel: bool,
}

/// Everything a backtest reports: the split, the fit, three partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub split: SplitSpec,
    pub sweep: SweepResult,
    pub selected_lookback: usize,
    pub train: PerformanceReport,
    pub test: PerformanceReport,
    pub full: PerformanceReport,
}

impl WalkForwardReport {
    pub fn partition(&self, partition: Partition) -> &PerformanceReport {
        match partition {
            Partition::Train => &self.train,
            Partition::Test => &self.test,
            Partition::Full => &self.full,
        }
    }
}

/// Per-partition evaluations behind a [`WalkForwardReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionEvaluations {
    pub train: Evaluation,
    pub test: Evaluation,
    pub full: Evaluation,
}

impl PartitionEvaluations {
    pub fn get(&self, partition: Partition) -> &Evaluation {
        match partition {
            Partition::Train => &self.train,
            Partition::Test => &self.test,
            Partition::Full => &self.full,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardRun {
    pub report: WalkForwardReport,
    pub evaluations: PartitionEvaluations,
}

/// Output of the daily signal command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySignalReport {
    pub sweep: SweepResult,
    pub selected_lookback: usize,
    pub as_of: NaiveDateTime,
    pub signal: LatestSignal,
}

// ─── Harness ─────────────────────────────────────────────────────────

/// Sweep `training` and return the full candidate mapping.
pub fn fit_lookback(
    training: &PriceTable,
    config: &SweepConfig,
    parallel: bool,
) -> Result<SweepResult, EngineError> {
    LookbackSweep::new(*config)
        .with_parallelism(parallel)
        .run(training)
}

/// Fit on the training partition, then evaluate train, test and full.
///
/// Fails with `InsufficientData` if either partition has fewer than
/// `lookback_min + 1` rows. A training partition of exactly that size passes
/// the guard but leaves no lagged return for any candidate, so the sweep then
/// fails with `NoViableParameter`. Scoring needs at least `lookback + 3` rows.
pub fn run_walk_forward(
    prices: &PriceTable,
    config: &WalkForwardConfig,
) -> Result<WalkForwardRun, WalkForwardError> {
    let split = split_chronological(prices.len(), config.split_fraction)?;
    let required = config.sweep.range.min + 1;
    let train = partition_table(prices, &split.train, required, "training partition")?;
    let test = partition_table(prices, &split.test, required, "testing partition")?;

    tracing::info!(
        train_rows = split.train.len(),
        test_rows = split.test.len(),
        train_end = %train.last_timestamp(),
        test_start = %test.first_timestamp(),
        "walk-forward split"
    );

    let sweep = fit_lookback(&train, &config.sweep, config.parallel)?;
    let selected_lookback = sweep.best_lookback;
    let strategy = config.sweep.strategy(selected_lookback);
    tracing::info!(selected_lookback, score = sweep.best_score, "lookback selected on training rows");

    let run = |partition: Partition, table: &PriceTable| {
        evaluate(table, &strategy).map_err(|source| WalkForwardError::Partition { partition, source })
    };
    let evaluations = PartitionEvaluations {
        train: run(Partition::Train, &train)?,
        test: run(Partition::Test, &test)?,
        full: run(Partition::Full, prices)?,
    };

    let ppy = config.sweep.periods_per_year;
    let report = WalkForwardReport {
        split,
        selected_lookback,
        train: PerformanceReport::compute(Partition::Train.as_str(), &evaluations.train, ppy),
        test: PerformanceReport::compute(Partition::Test.as_str(), &evaluations.test, ppy),
        full: PerformanceReport::compute(Partition::Full.as_str(), &evaluations.full, ppy),
        sweep,
    };
    Ok(WalkForwardRun {
        report,
        evaluations,
    })
}

/// Fit on the whole table, then read the latest long/short lists.
pub fn run_daily_signal(
    prices: &PriceTable,
    config: &SweepConfig,
    parallel: bool,
) -> Result<DailySignalReport, EngineError> {
    let sweep = fit_lookback(prices, config, parallel)?;
    let selected_lookback = sweep.best_lookback;
    let signal = latest_signal(prices, selected_lookback, config.top_k)?;
    tracing::info!(
        selected_lookback,
        as_of = %signal.as_of,
        longs = ?signal.long_assets(),
        shorts = ?signal.short_assets(),
        "daily signal"
    );
    Ok(DailySignalReport {
        sweep,
        selected_lookback,
        as_of: signal.as_of,
        signal,
    })
}

fn partition_table(
    prices: &PriceTable,
    rows: &Range<usize>,
    required: usize,
    context: &'static str,
) -> Result<PriceTable, EngineError> {
    let insufficient = EngineError::InsufficientData {
        context,
        required,
        available: rows.len(),
    };
    if rows.len() < required {
        return Err(insufficient);
    }
    prices.slice(rows.start, rows.end).ok_or(insufficient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::LookbackRange;
    use xsmom_core::data::synthetic_panel;

    fn prices(rows: usize) -> PriceTable {
        let assets: Vec<String> = (0..6).map(|i| format!("W{i}")).collect();
        synthetic_panel(&assets, rows, 12, "walk-forward-unit").unwrap()
    }

    fn config(min: usize, max: usize, split: f64) -> WalkForwardConfig {
        WalkForwardConfig {
            sweep: SweepConfig {
                range: LookbackRange { min, max },
                top_k: 2,
                cost_rate: 0.0005,
                period_hours: 12,
                periods_per_year: 730.0,
            },
            split_fraction: split,
            parallel: false,
        }
    }

    // ── Split ──

    #[test]
    fn split_floors_the_boundary() {
        let s = split_chronological(10, 0.75).unwrap();
        assert_eq!(s.train, 0..7);
        assert_eq!(s.test, 7..10);
        let s = split_chronological(100, 0.75).unwrap();
        assert_eq!((s.train.end, s.test.start, s.test.end), (75, 75, 100));
    }

    #[test]
    fn split_rejects_fraction_outside_unit_interval() {
        for f in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                split_chronological(100, f),
                Err(EngineError::InvalidParameter { name: "split_fraction", .. })
            ));
        }
    }

    // ── Harness ──

    #[test]
    fn reports_cover_their_partitions() {
        let p = prices(200);
        let run = run_walk_forward(&p, &config(3, 20, 0.75)).unwrap();
        let r = &run.report;
        assert_eq!(r.split.train, 0..150);
        assert_eq!(r.split.test, 150..200);
        assert_eq!(r.selected_lookback, r.sweep.best_lookback);

        let l = r.selected_lookback;
        // rows - 1 returns, - (L - 1) warm-up rows, - 1 lagged row
        assert_eq!(r.train.periods, 150 - 1 - l);
        assert_eq!(r.test.periods, 50 - 1 - l);
        assert_eq!(r.full.periods, 200 - 1 - l);
        assert_eq!(r.partition(Partition::Test).partition, "test");

        // test reports start after training rows end
        assert!(r.test.start.unwrap() > p.timestamps()[149]);
        assert_eq!(run.evaluations.get(Partition::Full).returns, r.full.returns);
    }

    #[test]
    fn short_partition_is_insufficient() {
        let p = prices(60);
        // 0.9 * 60 = 54 training rows, 6 test rows < 10 + 1
        let err = run_walk_forward(&p, &config(10, 20, 0.9)).unwrap_err();
        assert!(matches!(
            err,
            WalkForwardError::Engine(EngineError::InsufficientData {
                context: "testing partition",
                required: 11,
                available: 6,
            })
        ));
    }

    #[test]
    fn partition_at_minimum_size_has_no_viable_candidate() {
        let p = prices(8);
        // 4 training rows = lookback_min + 1: guard passes, nothing scores
        let err = run_walk_forward(&p, &config(3, 5, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            WalkForwardError::Engine(EngineError::NoViableParameter { candidates: 3 })
        ));

        // one row short of the guard is reported as insufficient data
        let err = run_walk_forward(&prices(6), &config(3, 5, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            WalkForwardError::Engine(EngineError::InsufficientData {
                context: "training partition",
                required: 4,
                available: 3,
            })
        ));
    }

    #[test]
    fn selected_lookback_too_long_for_test_names_partition() {
        let p = prices(120);
        // test partition: 12 rows; any lookback >= 11 cannot be evaluated there
        match run_walk_forward(&p, &config(11, 40, 0.9)) {
            Err(WalkForwardError::Partition { partition, .. }) => {
                assert_eq!(partition, Partition::Test)
            }
            other => panic!("expected test partition failure, got {other:?}"),
        }
    }

    #[test]
    fn daily_signal_uses_fitted_lookback() {
        let p = prices(150);
        let cfg = config(3, 25, 0.75).sweep;
        let daily = run_daily_signal(&p, &cfg, true).unwrap();
        let fitted = fit_lookback(&p, &cfg, false).unwrap();
        assert_eq!(daily.selected_lookback, fitted.best_lookback);
        assert_eq!(daily.as_of, p.last_timestamp());
        assert_eq!(daily.signal.longs.len(), 2);
        assert_eq!(daily.signal.shorts.len(), 2);
        assert_eq!(
            daily.signal,
            latest_signal(&p, fitted.best_lookback, 2).unwrap()
        );
    }

    #[test]
    fn partition_display() {
        assert_eq!(Partition::Train.to_string(), "train");
        assert_eq!(serde_json::to_string(&Partition::Full).unwrap(), "\"full\"");
    }
}

//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for run results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: tuning grid, per-partition returns and positions, daily lists
//! - **Markdown**: a per-partition metrics summary
//!
//! All persisted artifacts include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use xsmom_core::data::csv_io::WRITE_FORMAT;
use xsmom_core::domain::{Panel, ReturnSeries};
use xsmom_core::engine::{Evaluation, LatestSignal};

use crate::metrics::PerformanceReport;
use crate::runner::{BacktestResult, BacktestRun, SignalResult, SCHEMA_VERSION};
use crate::sweep::SweepResult;
use crate::walk_forward::Partition;

pub const REPORT_FILE: &str = "report.json";
pub const TUNING_FILE: &str = "parameter_tuning_results.csv";
pub const SUMMARY_FILE: &str = "summary.md";
pub const DAILY_FILE: &str = "daily_long_short.csv";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    check_schema(result.schema_version)?;
    Ok(result)
}

pub fn export_signal_json(result: &SignalResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize SignalResult to JSON")
}

pub fn import_signal_json(json: &str) -> Result<SignalResult> {
    let result: SignalResult =
        serde_json::from_str(json).context("failed to deserialize SignalResult from JSON")?;
    check_schema(result.schema_version)?;
    Ok(result)
}

fn check_schema(version: u32) -> Result<()> {
    if version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            version,
            SCHEMA_VERSION
        );
    }
    Ok(())
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Sweep grid as `lookback,sharpe`. Excluded candidates have an empty score.
pub fn export_tuning_csv(sweep: &SweepResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["lookback", "sharpe"])?;
    for c in &sweep.candidates {
        let score = if c.is_viable() {
            format!("{:.6}", c.score)
        } else {
            String::new()
        };
        wtr.write_record([c.lookback.to_string(), score])?;
    }
    finish(wtr)
}

/// Net returns per asset plus the portfolio `returns` column.
pub fn export_returns_csv(evaluation: &Evaluation) -> Result<String> {
    let net = &evaluation.net;
    let series = &evaluation.returns;
    if net.len() != series.len() {
        bail!(
            "asset returns have {} rows but the portfolio series has {}",
            net.len(),
            series.len()
        );
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["timestamp".to_string()];
    header.extend(net.assets().iter().cloned());
    header.push("returns".into());
    wtr.write_record(&header)?;

    for ((ts, row), total) in net.iter().zip(&series.values) {
        let mut record = Vec::with_capacity(row.len() + 2);
        record.push(ts.format(WRITE_FORMAT).to_string());
        record.extend(row.iter().map(|r| format!("{r:.10}")));
        record.push(format!("{total:.10}"));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Position weights, one column per asset.
pub fn export_positions_csv(positions: &Panel<f64>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["timestamp".to_string()];
    header.extend(positions.assets().iter().cloned());
    wtr.write_record(&header)?;

    for (ts, row) in positions.iter() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(ts.format(WRITE_FORMAT).to_string());
        record.extend(row.iter().map(|w| format!("{w:.6}")));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Daily lists as `asset,rank,score,signal`, longs first.
pub fn export_daily_csv(signal: &LatestSignal) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["asset", "rank", "score", "signal"])?;
    let legs = signal
        .longs
        .iter()
        .map(|a| (a, "long"))
        .chain(signal.shorts.iter().map(|a| (a, "short")));
    for (a, side) in legs {
        wtr.write_record([
            a.asset.clone(),
            a.rank.to_string(),
            format!("{:.10}", a.score),
            side.to_string(),
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a backtest run.
///
/// Creates a directory named `backtest_{run_id[..8]}_{timestamp}/` under
/// `output_dir` containing:
/// - `report.json` — the full `BacktestResult`
/// - `parameter_tuning_results.csv` — the training sweep grid
/// - `returns_{train,test,full}.csv` and `positions_{train,test,full}.csv`
/// - `summary.md` — metrics table per partition
///
/// Returns the path to the created directory.
pub fn save_artifacts(run: &BacktestRun, output_dir: &Path) -> Result<PathBuf> {
    let result = &run.result;
    let run_dir = create_run_dir(output_dir, "backtest", &result.run_id)?;

    write(&run_dir, REPORT_FILE, &export_json(result)?)?;
    write(&run_dir, TUNING_FILE, &export_tuning_csv(&result.report.sweep)?)?;
    for partition in Partition::ALL {
        let eval = run.evaluations.get(partition);
        write(
            &run_dir,
            &format!("returns_{partition}.csv"),
            &export_returns_csv(eval)?,
        )?;
        write(
            &run_dir,
            &format!("positions_{partition}.csv"),
            &export_positions_csv(&eval.positions)?,
        )?;
    }
    write(&run_dir, SUMMARY_FILE, &generate_summary(result))?;

    tracing::info!(dir = %run_dir.display(), "backtest artifacts saved");
    Ok(run_dir)
}

/// Save the daily signal artifacts: `report.json`, the tuning grid, and
/// `daily_long_short.csv`, under `signal_{run_id[..8]}_{timestamp}/`.
pub fn save_daily_artifacts(result: &SignalResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = create_run_dir(output_dir, "signal", &result.run_id)?;
    write(&run_dir, REPORT_FILE, &export_signal_json(result)?)?;
    write(&run_dir, TUNING_FILE, &export_tuning_csv(&result.report.sweep)?)?;
    write(&run_dir, DAILY_FILE, &export_daily_csv(&result.report.signal)?)?;
    tracing::info!(dir = %run_dir.display(), "signal artifacts saved");
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's report.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join(REPORT_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn create_run_dir(output_dir: &Path, kind: &str, run_id: &str) -> Result<PathBuf> {
    let short_id = run_id.get(..8).unwrap_or(run_id);
    let dirname = format!(
        "{kind}_{short_id}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;
    Ok(run_dir)
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown summary for a backtest run.
pub fn generate_summary(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let report = &result.report;

    md.push_str("# Cross-Sectional Momentum Backtest\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!(
        "| Universe | {} assets ({}) |\n",
        result.data.assets.len(),
        result.data.assets.join(", ")
    ));
    md.push_str(&format!(
        "| Rows | {} ({}-hour periods) |\n",
        result.data.rows, result.config.data.period_hours
    ));
    md.push_str(&format!("| Source | {} |\n", result.data.source));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.data.dataset_hash));
    if result.data.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push_str(&format!(
        "| Split | train rows {}..{}, test rows {}..{} |\n",
        report.split.train.start, report.split.train.end, report.split.test.start, report.split.test.end
    ));
    md.push_str(&format!(
        "| Lookback Grid | {}..={} ({} excluded) |\n",
        result.config.sweep.lookback_min,
        result.config.sweep.lookback_max,
        report.sweep.excluded()
    ));
    md.push_str(&format!(
        "| Selected Lookback | {} (train Sharpe {:.3}) |\n",
        report.selected_lookback, report.sweep.best_score
    ));
    md.push_str(&format!(
        "| Top K / Cost | {} / {} |\n",
        result.config.strategy.top_k, result.config.strategy.cost_rate
    ));
    md.push('\n');

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Train | Test | Full |\n");
    md.push_str("| --- | ---: | ---: | ---: |\n");
    let rows: [(&str, fn(&PerformanceReport) -> String); 10] = [
        ("Periods", |r| r.periods.to_string()),
        ("Period", |r| span(&r.returns)),
        ("Total Return", |r| pct(r.total_return)),
        ("Annualized Return", |r| pct(r.annualized_return)),
        ("Annualized Volatility", |r| pct(r.annualized_volatility)),
        ("Sharpe", |r| format!("{:.3}", r.sharpe)),
        ("Sortino", |r| format!("{:.3}", r.sortino)),
        ("Calmar", |r| format!("{:.3}", r.calmar)),
        ("Max Drawdown", |r| pct(r.max_drawdown)),
        ("Mean Turnover", |r| format!("{:.4}", r.mean_turnover)),
    ];
    for (label, cell) in rows {
        md.push_str(&format!(
            "| {label} | {} | {} | {} |\n",
            cell(&report.train),
            cell(&report.test),
            cell(&report.full)
        ));
    }
    md.push('\n');
    md
}

fn pct(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

fn span(series: &ReturnSeries) -> String {
    match (series.first_timestamp(), series.last_timestamp()) {
        (Some(a), Some(b)) => format!("{} to {}", a.format("%Y-%m-%d"), b.format("%Y-%m-%d")),
        _ => "-".into(),
    }
}

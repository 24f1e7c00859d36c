//! xsmom CLI — backtest, daily signal, and cache management commands.
//!
//! Commands:
//! - `backtest` — sweep lookbacks on the training split, report train/test/full
//! - `signal` — fit on all rows and print today's long/short lists
//! - `cache import` — resample a wide CSV and store it as a Parquet dataset
//! - `cache status` — list cached datasets with their ranges
//! - `cache remove` — delete a cached dataset

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xsmom_core::data::PanelCache;
use xsmom_runner::export::{save_artifacts, save_daily_artifacts};
use xsmom_runner::{
    import_csv, run_backtest, run_signal, BacktestConfig, BacktestResult, LoadOptions,
    PerformanceReport, PriceSpec, SignalResult,
};

#[derive(Parser)]
#[command(
    name = "xsmom",
    about = "xsmom — cross-sectional crypto momentum backtester"
)]
struct Cli {
    /// Debug-level logging (overrides RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk-forward backtest: fit the lookback on training rows, report train/test/full.
    Backtest(RunArgs),
    /// Fit the lookback on all rows and emit the latest long/short lists.
    Signal(RunArgs),
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Inputs shared by `backtest` and `signal`. Flags override the config file.
#[derive(Args)]
struct RunArgs {
    /// Wide CSV of quotes (timestamp column, one column per asset).
    #[arg(long)]
    prices: Option<PathBuf>,

    /// Cached dataset name (see `xsmom cache import`).
    #[arg(long)]
    dataset: Option<String>,

    /// Use a synthetic panel; with --dataset, only when the dataset is not cached.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resample period in hours.
    #[arg(long)]
    period_hours: Option<u32>,

    /// Names held per side.
    #[arg(long)]
    top_k: Option<usize>,

    /// Cost per unit of turnover.
    #[arg(long)]
    cost_rate: Option<f64>,

    /// Training fraction of rows, in (0, 1).
    #[arg(long)]
    split: Option<f64>,

    #[arg(long)]
    lookback_min: Option<usize>,

    #[arg(long)]
    lookback_max: Option<usize>,

    /// Evaluate sweep candidates on one thread.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Output directory for artifacts.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

impl RunArgs {
    /// File (or defaults) with flags applied on top, validated.
    fn resolve_config(&self) -> Result<BacktestConfig> {
        let mut config = match &self.config {
            Some(path) => BacktestConfig::from_file(path)?,
            None => BacktestConfig::default(),
        };
        if let Some(h) = self.period_hours {
            config.data.period_hours = h;
        }
        if let Some(dir) = &self.cache_dir {
            config.data.cache_dir = dir.clone();
        }
        if let Some(k) = self.top_k {
            config.strategy.top_k = k;
        }
        if let Some(c) = self.cost_rate {
            config.strategy.cost_rate = c;
        }
        if let Some(f) = self.split {
            config.walk_forward.split_fraction = f;
        }
        if let Some(min) = self.lookback_min {
            config.sweep.lookback_min = min;
        }
        if let Some(max) = self.lookback_max {
            config.sweep.lookback_max = max;
        }
        if self.sequential {
            config.sweep.parallel = false;
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Price source plus whether a missing dataset may fall back to synthetic.
    fn price_spec(&self) -> Result<(PriceSpec, bool)> {
        match (&self.prices, &self.dataset) {
            (Some(_), Some(_)) => bail!("--prices and --dataset are mutually exclusive"),
            (Some(_), None) if self.synthetic => {
                bail!("--synthetic cannot be combined with --prices")
            }
            (Some(path), None) => Ok((PriceSpec::Csv(path.clone()), false)),
            (None, Some(name)) => Ok((PriceSpec::Dataset(name.clone()), self.synthetic)),
            (None, None) if self.synthetic => Ok((PriceSpec::Synthetic, false)),
            (None, None) => bail!("one of --prices, --dataset or --synthetic is required"),
        }
    }

    fn prepare(&self) -> Result<(BacktestConfig, PriceSpec, LoadOptions)> {
        let config = self.resolve_config()?;
        let (spec, fallback) = self.price_spec()?;
        let mut opts = LoadOptions::from_config(&config);
        opts.synthetic_fallback = fallback;
        debug!(?config, ?spec, "resolved run inputs");
        Ok((config, spec, opts))
    }
}

#[derive(Subcommand)]
enum CacheAction {
    /// Resample a wide CSV and store it as a named dataset.
    Import {
        /// Dataset name (letters, digits, `-`, `_`, `.`).
        name: String,

        /// Wide CSV of quotes.
        #[arg(long)]
        prices: PathBuf,

        /// Resample period in hours.
        #[arg(long, default_value_t = 12)]
        period_hours: u32,

        /// Cache directory.
        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
    /// List cached datasets with their date ranges and sizes.
    Status {
        /// Cache directory.
        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
    /// Delete a cached dataset.
    Remove {
        name: String,

        /// Cache directory.
        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Backtest(args) => run_backtest_cmd(&args),
        Commands::Signal(args) => run_signal_cmd(&args),
        Commands::Cache { action } => match action {
            CacheAction::Import {
                name,
                prices,
                period_hours,
                cache_dir,
            } => run_cache_import(&name, &prices, period_hours, cache_dir),
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Remove { name, cache_dir } => run_cache_remove(&name, &cache_dir),
        },
    }
}

/// `RUST_LOG` if set, else `info`; `--verbose` forces `debug`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_backtest_cmd(args: &RunArgs) -> Result<()> {
    let (config, spec, opts) = args.prepare()?;
    let run = run_backtest(&config, &spec, &opts)?;

    print_summary(&run.result);

    let run_dir = save_artifacts(&run, &config.output.dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_signal_cmd(args: &RunArgs) -> Result<()> {
    let (config, spec, opts) = args.prepare()?;
    let result = run_signal(&config, &spec, &opts)?;

    print_signal(&result);

    let run_dir = save_daily_artifacts(&result, &config.output.dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_cache_import(name: &str, prices: &Path, period_hours: u32, cache_dir: PathBuf) -> Result<()> {
    if period_hours == 0 {
        bail!("--period-hours must be >= 1");
    }
    let opts = LoadOptions {
        period_hours,
        cache_dir,
        ..LoadOptions::from_config(&BacktestConfig::default())
    };
    let meta = import_csv(prices, name, &opts)?;
    println!(
        "Imported '{}': {} assets, {} rows, {} to {}",
        meta.name,
        meta.assets.len(),
        meta.row_count,
        meta.start,
        meta.end
    );
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = PanelCache::new(cache_dir);
    let metas = cache.list()?;
    if metas.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let sizes: Vec<u64> = metas
        .iter()
        .map(|m| dir_size(&cache_dir.join(format!("dataset={}", m.name))))
        .collect();

    println!("Cache: {}", cache_dir.display());
    println!("Datasets: {}", metas.len());
    println!("Total size: {}", format_size(sizes.iter().sum()));
    println!();
    println!(
        "{:<16} {:>6} {:>7} {:<41} {:>10}",
        "Dataset", "Assets", "Rows", "Range", "Size"
    );
    println!("{}", "-".repeat(84));
    for (m, size) in metas.iter().zip(&sizes) {
        println!(
            "{:<16} {:>6} {:>7} {:<41} {:>10}",
            m.name,
            m.assets.len(),
            m.row_count,
            format!("{} to {}", m.start, m.end),
            format_size(*size)
        );
    }
    Ok(())
}

fn run_cache_remove(name: &str, cache_dir: &Path) -> Result<()> {
    let cache = PanelCache::new(cache_dir);
    if cache.remove(name)? {
        println!("Removed: {name}");
    } else {
        println!("No cached dataset named '{name}'");
    }
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    let mut size = 0u64;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                size += meta.len();
            }
        }
    }
    size
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_summary(result: &BacktestResult) {
    let report = &result.report;
    println!();
    println!("=== Backtest Result ===");
    println!(
        "Universe:       {} assets, {} rows ({})",
        result.data.assets.len(),
        result.data.rows,
        result.data.source
    );
    println!(
        "Split:          train {}..{}, test {}..{}",
        report.split.train.start, report.split.train.end, report.split.test.start, report.split.test.end
    );
    println!(
        "Lookback:       {} (train Sharpe {:.3}, {} of {} candidates excluded)",
        report.selected_lookback,
        report.sweep.best_score,
        report.sweep.excluded(),
        report.sweep.candidates.len()
    );
    println!();
    println!(
        "{:<10} {:>8} {:>10} {:>10} {:>8} {:>8} {:>10}",
        "Partition", "Periods", "Return", "CAGR", "Sharpe", "Sortino", "Max DD"
    );
    println!("{}", "-".repeat(70));
    for r in [&report.train, &report.test, &report.full] {
        print_partition(r);
    }
    if result.data.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    if result.data.dropped_buckets > 0 {
        println!(
            "WARNING: {} period(s) dropped during resampling (missing quotes)",
            result.data.dropped_buckets
        );
    }
    println!();
}

fn print_partition(r: &PerformanceReport) {
    println!(
        "{:<10} {:>8} {:>9.2}% {:>9.2}% {:>8.3} {:>8.3} {:>9.2}%",
        r.partition,
        r.periods,
        r.total_return * 100.0,
        r.annualized_return * 100.0,
        r.sharpe,
        r.sortino,
        r.max_drawdown * 100.0
    );
}

fn print_signal(result: &SignalResult) {
    let report = &result.report;
    println!();
    println!("=== Daily Signal ===");
    println!("As of:          {}", report.as_of);
    println!(
        "Lookback:       {} (Sharpe {:.3} over all rows)",
        report.selected_lookback, report.sweep.best_score
    );
    println!();
    println!("{:<6} {:<14} {:>5} {:>12}", "Side", "Asset", "Rank", "Score");
    println!("{}", "-".repeat(40));
    for a in &report.signal.longs {
        println!("{:<6} {:<14} {:>5} {:>12.6}", "LONG", a.asset, a.rank, a.score);
    }
    for a in &report.signal.shorts {
        println!("{:<6} {:<14} {:>5} {:>12.6}", "SHORT", a.asset, a.rank, a.score);
    }
    if result.data.has_synthetic {
        println!();
        println!("WARNING: Signal based on SYNTHETIC data");
    }
    println!();
}

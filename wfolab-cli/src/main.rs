//! wfolab CLI — walk-forward runs and split plans.
//!
//! Commands:
//! - `run` — walk-forward optimization over a CSV file or a synthetic series
//! - `splits` — print the train/test split plan for a series length

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wfolab_core::synthetic::{random_walk_series, regime_switching_series};
use wfolab_core::{RegimeContext, TimeSeries};
use wfolab_runner::data_loader::dataset_hash;
use wfolab_runner::splitter::splits_overlap;
use wfolab_runner::{load_csv, save_run, splits, RunArtifact, WfoConfig, WfoOrchestrator, WfoRun};

#[derive(Parser)]
#[command(
    name = "wfolab",
    about = "wfolab CLI — regime-aware walk-forward optimization"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a walk-forward optimization and write windows.csv, summary.json, run.json.
    Run {
        /// OHLCV CSV file (timestamp, open, high, low, close[, volume, regime, ...]).
        #[arg(long)]
        data: Option<PathBuf>,

        /// Path to a TOML config file. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use a seeded synthetic series instead of --data.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Synthetic series length.
        #[arg(long, default_value_t = 1000)]
        bars: usize,

        /// Synthetic series seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Plain random walk instead of alternating trend/range segments.
        #[arg(long, default_value_t = false)]
        random_walk: bool,

        /// Output directory.
        #[arg(long, default_value = "results")]
        out: PathBuf,
    },
    /// Print the split plan for a series of the given length.
    Splits {
        #[arg(long)]
        total: usize,

        #[arg(long)]
        train: usize,

        #[arg(long)]
        test: usize,

        /// Step between windows. Defaults to the test size.
        #[arg(long)]
        step: Option<usize>,

        #[arg(long)]
        max_splits: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            config,
            synthetic,
            bars,
            seed,
            random_walk,
            out,
        } => run_wfo_cmd(data, config, synthetic, bars, seed, random_walk, out),
        Commands::Splits {
            total,
            train,
            test,
            step,
            max_splits,
        } => run_splits_cmd(total, train, test, step.unwrap_or(test), max_splits),
    }
}

fn run_wfo_cmd(
    data: Option<PathBuf>,
    config_path: Option<PathBuf>,
    synthetic: bool,
    bars: usize,
    seed: u64,
    random_walk: bool,
    out: PathBuf,
) -> Result<()> {
    if data.is_some() && synthetic {
        bail!("--data and --synthetic are mutually exclusive");
    }

    let config = match &config_path {
        Some(path) => WfoConfig::load(path)?,
        None => WfoConfig::default(),
    };

    let (series, regimes, hash) = match data {
        Some(path) => {
            let loaded = load_csv(&path)?;
            (loaded.series, loaded.regimes, Some(loaded.dataset_hash))
        }
        None if synthetic => {
            let series = synthetic_series(bars, seed, random_walk);
            let hash = dataset_hash(series.bars());
            (series, None, Some(hash))
        }
        None => bail!("one of --data or --synthetic is required"),
    };

    let orchestrator = WfoOrchestrator::new(config.clone())?;
    let run = run_with_labels(&orchestrator, &series, regimes.as_ref())?;

    print_summary(&run);

    let artifact = RunArtifact::new(config, run, hash);
    let dir = save_run(&artifact, &out)
        .with_context(|| format!("saving run to {}", out.display()))?;
    println!("Artifacts saved to: {}", dir.display());
    Ok(())
}

fn synthetic_series(bars: usize, seed: u64, random_walk: bool) -> TimeSeries {
    if random_walk {
        random_walk_series(bars, seed, 100.0, 0.01)
    } else {
        regime_switching_series(bars, seed, 60)
    }
}

fn run_with_labels(
    orchestrator: &WfoOrchestrator,
    series: &TimeSeries,
    regimes: Option<&RegimeContext>,
) -> Result<WfoRun> {
    let run = orchestrator.run_with_progress(series, regimes, |w| {
        let status = if w.skipped { "skipped" } else { "ok" };
        info!(
            window = w.index,
            status,
            regime = %w.train_regime,
            test_score = ?w.test_score,
            "window done"
        );
    })?;
    Ok(run)
}

fn run_splits_cmd(
    total: usize,
    train: usize,
    test: usize,
    step: usize,
    max_splits: Option<usize>,
) -> Result<()> {
    let plan = splits(total, train, test, step, max_splits)?;

    println!("{:>5} {:>12} {:>12}", "Split", "Train", "Test");
    println!("{}", "-".repeat(31));
    for s in &plan {
        println!(
            "{:>5} {:>12} {:>12}",
            s.index,
            format!("{}..{}", s.train_start, s.train_end),
            format!("{}..{}", s.test_start, s.test_end),
        );
    }
    println!();
    println!("{} split(s)", plan.len());
    if splits_overlap(&plan) {
        println!("WARNING: test windows overlap (step < test)");
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>, scale: f64, precision: usize) -> String {
    value.map_or_else(
        || "n/a".to_string(),
        |v| format!("{:.*}", precision, v * scale),
    )
}

fn print_summary(run: &WfoRun) {
    let agg = &run.aggregate;
    println!();
    println!("=== Walk-Forward Result ===");
    println!("Metric:          {}", run.metric);
    println!("Bars:            {}", run.total_bars);
    println!("Candidates:      {}", run.candidates);
    println!(
        "Windows:         {} ({} ok, {} skipped)",
        agg.total_windows, agg.successful_windows, agg.skipped_windows
    );
    println!();
    println!("--- Out of sample ---");
    println!("Mean Return:     {}%", fmt_opt(agg.mean_test_return, 100.0, 2));
    println!("Std Return:      {}%", fmt_opt(agg.std_test_return, 100.0, 2));
    println!("Mean Score:      {}", fmt_opt(agg.mean_test_score, 1.0, 3));
    println!("Robustness:      {}", fmt_opt(agg.mean_robustness, 1.0, 3));
    println!("Consistency:     {}%", fmt_opt(agg.consistency_pct, 1.0, 1));
    println!("Stability:       {}", fmt_opt(agg.stability, 1.0, 3));
    if let Some(modal) = &agg.modal_params {
        println!("Modal Params:    {} ({} windows)", modal.label(), agg.modal_count);
    }
    for (regime, count) in &agg.windows_by_regime {
        println!("Regime {regime:<9} {count} window(s)");
    }
    if run.splits_overlap {
        println!();
        println!("WARNING: test windows overlap; aggregates count shared bars more than once");
    }
    println!();
}

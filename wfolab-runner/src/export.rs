//! Export — per-window CSV, aggregate JSON, and the full run as JSON.
//!
//! The run artifact carries a `schema_version`; newer versions are rejected
//! on load. Missing values are written as empty CSV cells and JSON `null`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wfolab_core::regime::RegimeSummary;

use crate::config::WfoConfig;
use crate::fitness::ScoreMetric;
use crate::orchestrator::{AggregateStats, WfoRun, WindowResult};

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

pub const WINDOWS_FILE: &str = "windows.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const RUN_FILE: &str = "run.json";

/// Everything needed to inspect or reproduce a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub dataset_hash: Option<String>,
    pub config: WfoConfig,
    pub run: WfoRun,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunArtifact {
    pub fn new(config: WfoConfig, run: WfoRun, dataset_hash: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            dataset_hash,
            config,
            run,
        }
    }
}

/// The aggregate record written to `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub schema_version: u32,
    pub metric: ScoreMetric,
    pub total_bars: usize,
    pub candidates: usize,
    pub splits_overlap: bool,
    #[serde(flatten)]
    pub aggregate: &'a AggregateStats,
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_run_json(artifact: &RunArtifact) -> Result<String> {
    serde_json::to_string_pretty(artifact).context("failed to serialize run to JSON")
}

/// Deserialize a run, rejecting unknown schema versions.
pub fn import_run_json(json: &str) -> Result<RunArtifact> {
    let artifact: RunArtifact =
        serde_json::from_str(json).context("failed to deserialize run from JSON")?;
    if artifact.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            artifact.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(artifact)
}

pub fn export_summary_json(run: &WfoRun) -> Result<String> {
    let summary = RunSummary {
        schema_version: SCHEMA_VERSION,
        metric: run.metric,
        total_bars: run.total_bars,
        candidates: run.candidates,
        splits_overlap: run.splits_overlap,
        aggregate: &run.aggregate,
    };
    serde_json::to_string_pretty(&summary).context("failed to serialize run summary to JSON")
}

// ─── CSV ────────────────────────────────────────────────────────────

const WINDOW_COLUMNS: [&str; 28] = [
    "window",
    "train_start",
    "train_end",
    "test_start",
    "test_end",
    "train_start_time",
    "train_end_time",
    "test_start_time",
    "test_end_time",
    "skipped",
    "skip_reason",
    "train_regime",
    "regime_composition",
    "test_bucket",
    "best_params",
    "best_score",
    "test_params",
    "train_score",
    "test_score",
    "robustness",
    "train_return",
    "test_return",
    "test_trades",
    "test_max_drawdown",
    "test_win_rate",
    "test_sharpe",
    "test_strictness",
    "evaluated",
];

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_f(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

fn time(value: Option<DateTime<Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn composition(summary: &RegimeSummary) -> String {
    summary
        .iter()
        .map(|(label, pct)| format!("{}:{pct:.1}", label.as_str()))
        .collect::<Vec<_>>()
        .join(";")
}

fn window_row(w: &WindowResult) -> Vec<String> {
    let test = w.test_result.as_ref().and_then(|r| r.metrics());
    vec![
        w.index.to_string(),
        w.train_start.to_string(),
        w.train_end.to_string(),
        w.test_start.to_string(),
        w.test_end.to_string(),
        time(w.train_start_time),
        time(w.train_end_time),
        time(w.test_start_time),
        time(w.test_end_time),
        w.skipped.to_string(),
        w.skip_reason.clone().unwrap_or_default(),
        w.train_regime.as_str().to_string(),
        composition(&w.regime_summary),
        opt(w.test_bucket.map(|b| b.as_str())),
        opt(w.best_params.as_ref().map(|p| p.label())),
        opt_f(w.best_score),
        opt(w.test_params.as_ref().map(|p| p.label())),
        opt_f(w.train_score),
        opt_f(w.test_score),
        opt_f(w.robustness),
        opt_f(w.train_return()),
        opt_f(w.test_return()),
        opt(test.map(|m| m.trade_count)),
        opt_f(test.map(|m| m.max_drawdown)),
        opt_f(test.map(|m| m.win_rate)),
        opt_f(test.map(|m| m.sharpe)),
        opt(test.and_then(|m| m.strictness_used).map(|s| s.as_str())),
        w.search.evaluated.to_string(),
    ]
}

/// One row per window. Null values are empty cells.
pub fn export_windows_csv(windows: &[WindowResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(WINDOW_COLUMNS)?;
    for w in windows {
        wtr.write_record(window_row(w))?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `windows.csv`, `summary.json` and `run.json` into `output_dir`,
/// creating it if needed. Returns the directory.
pub fn save_run(artifact: &RunArtifact, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let files = [
        (WINDOWS_FILE, export_windows_csv(&artifact.run.windows)?),
        (SUMMARY_FILE, export_summary_json(&artifact.run)?),
        (RUN_FILE, export_run_json(artifact)?),
    ];
    for (name, content) in files {
        let path = output_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(output_dir.to_path_buf())
}

/// Load a run from a directory written by [`save_run`].
pub fn load_run(dir: &Path) -> Result<RunArtifact> {
    let path = dir.join(RUN_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_run_json(&json)
}

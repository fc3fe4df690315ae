//! wfolab runner — evaluation, parallel parameter search, walk-forward
//! orchestration and export.
//!
//! This crate builds on `wfolab-core` to provide:
//! - Rolling train/test window splitting
//! - A simplified long/short trade ledger with bps costs and its metrics
//! - The strategy evaluator with validity policies
//! - Parameter search on a rayon pool, overall and per regime bucket
//! - The walk-forward orchestrator with per-window stage machine and
//!   aggregate robustness statistics
//! - TOML configuration, CSV loading and CSV/JSON export

pub mod config;
pub mod costs;
pub mod data_loader;
pub mod evaluator;
pub mod export;
pub mod fitness;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod search;
pub mod splitter;

pub use config::{ConfigError, WfoConfig};
pub use costs::CostModel;
pub use data_loader::{load_csv, read_csv, LoadError, LoadedSeries};
pub use evaluator::{
    Evaluate, EvaluationPolicy, EvaluationResult, EvaluationScope, InvalidReason,
    StrategyEvaluator, INVALID_SCORE,
};
pub use export::{save_run, RunArtifact, SCHEMA_VERSION};
pub use fitness::ScoreMetric;
pub use ledger::{run_ledger, Trade};
pub use metrics::EvaluationMetrics;
pub use orchestrator::{
    AggregateStats, InputError, WfoError, WfoOrchestrator, WfoRun, WindowResult, WindowStage,
};
pub use search::{
    ParameterSearch, RegimeBest, RegimeBucket, SearchConfig, SearchError, SearchOutcome,
};
pub use splitter::{splits, Split, SplitError};

//! Walk-forward orchestration — sequential windows, parallel search inside.
//!
//! Each split moves through an explicit stage machine:
//!
//! ```text
//! Split → OptimizeTrain → EvaluateTest → Record
//!                       ↘ Failed ──────↗
//! ```
//!
//! A window whose search finds nothing valid is recorded as skipped and the
//! run continues. Only input errors (bad series, bad config, unsatisfiable
//! split plan) abort, and they do so before the first window.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use wfolab_core::regime::{RegimeClassifier, RegimeSummary, SimpleRegime};
use wfolab_core::{ParameterSet, RegimeContext, SeriesError, TimeSeries};

use crate::config::{ConfigError, WfoConfig};
use crate::evaluator::{Evaluate, EvaluationResult, EvaluationScope, StrategyEvaluator};
use crate::fitness::ScoreMetric;
use crate::metrics::{coefficient_of_variation, mean_f64, std_dev};
use crate::search::{ParameterSearch, RegimeBest, RegimeBucket, SearchError, SearchOutcome, SearchStats};
use crate::splitter::{splits, splits_overlap, Split, SplitError};

// ─── Errors ──────────────────────────────────────────────────────────

/// Problems with the run's inputs. Always fatal, always raised before the
/// first window is processed.
#[derive(Debug, Error)]
pub enum InputError {
    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("regime labels cover {got} bars, series has {expected}")]
    RegimeLength { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum WfoError {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl From<SeriesError> for WfoError {
    fn from(err: SeriesError) -> Self {
        Self::Input(err.into())
    }
}

impl From<SplitError> for WfoError {
    fn from(err: SplitError) -> Self {
        Self::Input(err.into())
    }
}

impl From<ConfigError> for WfoError {
    fn from(err: ConfigError) -> Self {
        Self::Input(err.into())
    }
}

// ─── Results ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub index: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
    /// First and last bar timestamps of each range.
    pub train_start_time: Option<DateTime<Utc>>,
    pub train_end_time: Option<DateTime<Utc>>,
    pub test_start_time: Option<DateTime<Utc>>,
    pub test_end_time: Option<DateTime<Utc>>,

    pub best_params: Option<ParameterSet>,
    pub best_score: Option<f64>,
    pub best_by_regime: BTreeMap<RegimeBucket, RegimeBest>,
    /// Set chosen for the test range and the bucket it came from.
    pub test_params: Option<ParameterSet>,
    pub test_bucket: Option<RegimeBucket>,

    pub train_regime: SimpleRegime,
    pub regime_summary: RegimeSummary,

    pub train_result: Option<EvaluationResult>,
    pub test_result: Option<EvaluationResult>,
    pub train_score: Option<f64>,
    pub test_score: Option<f64>,
    pub robustness: Option<f64>,

    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub search: SearchStats,
}

impl WindowResult {
    fn from_split(split: &Split, series: &TimeSeries) -> Self {
        Self {
            index: split.index,
            train_start: split.train_start,
            train_end: split.train_end,
            test_start: split.test_start,
            test_end: split.test_end,
            train_start_time: series.timestamp(split.train_start),
            train_end_time: series.timestamp(split.train_end.saturating_sub(1)),
            test_start_time: series.timestamp(split.test_start),
            test_end_time: series.timestamp(split.test_end.saturating_sub(1)),
            best_params: None,
            best_score: None,
            best_by_regime: BTreeMap::new(),
            test_params: None,
            test_bucket: None,
            train_regime: SimpleRegime::Unknown,
            regime_summary: RegimeSummary::new(),
            train_result: None,
            test_result: None,
            train_score: None,
            test_score: None,
            robustness: None,
            skipped: false,
            skip_reason: None,
            search: SearchStats::default(),
        }
    }

    pub fn train_return(&self) -> Option<f64> {
        self.train_result.as_ref()?.metrics().map(|m| m.total_return)
    }

    pub fn test_return(&self) -> Option<f64> {
        self.test_result.as_ref()?.metrics().map(|m| m.total_return)
    }
}

/// Train-to-test score ratio, sign-corrected for negative train scores.
///
/// `test / train` when train is positive, `-test / train` when negative,
/// `None` when train is zero or either score is not finite.
pub fn robustness_ratio(train_score: f64, test_score: f64) -> Option<f64> {
    if !train_score.is_finite() || !test_score.is_finite() || train_score == 0.0 {
        return None;
    }
    if train_score > 0.0 {
        Some(test_score / train_score)
    } else {
        Some(-test_score / train_score)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_windows: usize,
    pub successful_windows: usize,
    pub skipped_windows: usize,
    pub mean_test_return: Option<f64>,
    pub std_test_return: Option<f64>,
    pub mean_test_score: Option<f64>,
    pub mean_robustness: Option<f64>,
    /// Percent of windows whose train and test returns share a sign.
    pub consistency_pct: Option<f64>,
    /// Coefficient of variation of each numeric tuned parameter across windows.
    pub param_cv: BTreeMap<String, f64>,
    /// `1 / (1 + mean CV)` over numeric parameters; 1.0 means the same values
    /// won every window. `None` when no numeric parameter has a CV.
    pub stability: Option<f64>,
    /// Test parameter set chosen most often, and how often.
    pub modal_params: Option<ParameterSet>,
    pub modal_count: usize,
    pub windows_by_regime: BTreeMap<SimpleRegime, usize>,
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

fn option_if(values: &[f64], f: impl Fn(&[f64]) -> f64) -> Option<f64> {
    (!values.is_empty()).then(|| f(values))
}

impl AggregateStats {
    /// `tuned` names the parameters that vary in the grid; when empty every
    /// numeric parameter counts toward the CVs.
    pub fn compute(windows: &[WindowResult], metric: ScoreMetric, tuned: &[String]) -> Self {
        let successful: Vec<&WindowResult> = windows.iter().filter(|w| !w.skipped).collect();

        let test_returns: Vec<f64> = successful.iter().filter_map(|w| w.test_return()).collect();
        let test_scores: Vec<f64> = successful
            .iter()
            .filter_map(|w| w.test_result.as_ref())
            .filter(|r| r.is_valid())
            .map(|r| r.score(metric))
            .collect();
        let robustness: Vec<f64> = successful.iter().filter_map(|w| w.robustness).collect();

        let paired: Vec<(f64, f64)> = successful
            .iter()
            .filter_map(|w| Some((w.train_return()?, w.test_return()?)))
            .collect();
        let consistency_pct = (!paired.is_empty()).then(|| {
            let matching = paired.iter().filter(|(a, b)| sign(*a) == sign(*b)).count();
            matching as f64 / paired.len() as f64 * 100.0
        });

        let param_cv = param_cvs(&successful, tuned);
        // Categorical axes (bools, strictness) have no CV; with nothing
        // numeric to measure there is no stability figure.
        let stability = (!param_cv.is_empty()).then(|| {
            let cvs: Vec<f64> = param_cv.values().copied().collect();
            1.0 / (1.0 + mean_f64(&cvs))
        });

        let mut tally: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for (order, params) in successful.iter().filter_map(|w| w.test_params.as_ref()).enumerate() {
            let entry = tally.entry(params.fingerprint().0).or_insert((0, order));
            entry.0 += 1;
        }
        // Most frequent; earliest first appearance breaks ties.
        let modal = tally
            .values()
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .copied();
        let modal_params = modal.and_then(|(_, order)| {
            successful
                .iter()
                .filter_map(|w| w.test_params.as_ref())
                .nth(order)
                .cloned()
        });

        let mut windows_by_regime = BTreeMap::new();
        for w in &successful {
            *windows_by_regime.entry(w.train_regime).or_insert(0) += 1;
        }

        Self {
            total_windows: windows.len(),
            successful_windows: successful.len(),
            skipped_windows: windows.len() - successful.len(),
            mean_test_return: option_if(&test_returns, mean_f64),
            std_test_return: option_if(&test_returns, std_dev),
            mean_test_score: option_if(&test_scores, mean_f64),
            mean_robustness: option_if(&robustness, mean_f64),
            consistency_pct,
            param_cv,
            stability,
            modal_params,
            modal_count: modal.map(|(count, _)| count).unwrap_or(0),
            windows_by_regime,
        }
    }
}

fn param_cvs(windows: &[&WindowResult], tuned: &[String]) -> BTreeMap<String, f64> {
    let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for params in windows.iter().filter_map(|w| w.test_params.as_ref()) {
        for (name, value) in params.iter() {
            if !tuned.is_empty() && !tuned.iter().any(|t| t == name) {
                continue;
            }
            if let Some(v) = value.as_f64() {
                values.entry(name.to_string()).or_default().push(v);
            }
        }
    }
    values
        .into_iter()
        .filter_map(|(name, vs)| coefficient_of_variation(&vs).map(|cv| (name, cv)))
        .collect()
}

/// A finished walk-forward run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WfoRun {
    pub metric: ScoreMetric,
    pub total_bars: usize,
    pub candidates: usize,
    pub splits_overlap: bool,
    pub windows: Vec<WindowResult>,
    pub aggregate: AggregateStats,
}

// ─── Stage machine ───────────────────────────────────────────────────

/// Where a single window is in its lifecycle.
#[derive(Debug)]
pub enum WindowStage {
    Split(Split),
    OptimizeTrain {
        split: Split,
        train: TimeSeries,
        regimes: RegimeContext,
    },
    Failed {
        split: Split,
        regimes: RegimeContext,
        outcome: SearchOutcome,
    },
    EvaluateTest {
        split: Split,
        train: TimeSeries,
        regimes: RegimeContext,
        outcome: SearchOutcome,
    },
    Record(WindowResult),
}

impl WindowStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Split(_) => "split",
            Self::OptimizeTrain { .. } => "optimize_train",
            Self::Failed { .. } => "failed",
            Self::EvaluateTest { .. } => "evaluate_test",
            Self::Record(_) => "record",
        }
    }
}

/// Borrowed inputs shared by every window of one run.
struct RunInputs<'a> {
    series: &'a TimeSeries,
    candidates: &'a [ParameterSet],
    regimes: Option<&'a RegimeContext>,
}

// ─── Orchestrator ────────────────────────────────────────────────────

pub struct WfoOrchestrator<E = StrategyEvaluator> {
    config: WfoConfig,
    search: ParameterSearch<E>,
    classifier: RegimeClassifier,
}

impl WfoOrchestrator<StrategyEvaluator> {
    /// Orchestrator with the evaluator described by `config`.
    pub fn new(config: WfoConfig) -> Result<Self, WfoError> {
        let evaluator = config.evaluator();
        Self::with_evaluator(config, evaluator)
    }
}

impl<E: Evaluate> WfoOrchestrator<E> {
    pub fn with_evaluator(config: WfoConfig, evaluator: E) -> Result<Self, WfoError> {
        config.validate()?;
        let search = ParameterSearch::from_config(evaluator, &config.search)?;
        let classifier = config.classifier();
        Ok(Self {
            config,
            search,
            classifier,
        })
    }

    pub fn config(&self) -> &WfoConfig {
        &self.config
    }

    /// Run over `series` with the configured grid.
    pub fn run(&self, series: &TimeSeries) -> Result<WfoRun, WfoError> {
        self.run_with_progress(series, None, |_| {})
    }

    /// Run with optional per-bar regime labels aligned to `series` (classified
    /// per train window when absent) and a callback invoked as each window is
    /// recorded.
    pub fn run_with_progress<F>(
        &self,
        series: &TimeSeries,
        regimes: Option<&RegimeContext>,
        progress: F,
    ) -> Result<WfoRun, WfoError>
    where
        F: FnMut(&WindowResult),
    {
        let candidates = self.config.candidates()?;
        self.run_candidates(series, &candidates, regimes, progress)
    }

    /// Run with an explicit candidate list instead of the configured grid.
    pub fn run_candidates<F>(
        &self,
        series: &TimeSeries,
        candidates: &[ParameterSet],
        regimes: Option<&RegimeContext>,
        mut progress: F,
    ) -> Result<WfoRun, WfoError>
    where
        F: FnMut(&WindowResult),
    {
        if series.is_empty() {
            return Err(SeriesError::Empty.into());
        }
        if let Some(context) = regimes {
            if context.len() != series.len() {
                return Err(InputError::RegimeLength {
                    expected: series.len(),
                    got: context.len(),
                }
                .into());
            }
        }

        let window = &self.config.window;
        let plan = splits(
            series.len(),
            window.train,
            window.test,
            window.step_size(),
            window.max_splits,
        )?;
        let overlap = splits_overlap(&plan);
        if overlap {
            warn!(
                step = window.step_size(),
                test = window.test,
                "test windows overlap; aggregate statistics are not independent"
            );
        }
        info!(
            bars = series.len(),
            windows = plan.len(),
            candidates = candidates.len(),
            workers = self.search.workers(),
            metric = %self.config.search.metric,
            "starting walk-forward run"
        );

        let inputs = RunInputs {
            series,
            candidates,
            regimes,
        };
        let mut windows = Vec::with_capacity(plan.len());
        for split in plan {
            let result = self.process_window(split, &inputs);
            progress(&result);
            windows.push(result);
        }

        let tuned: Vec<String> = self
            .config
            .grid
            .axes()
            .filter(|(_, values)| values.len() > 1)
            .map(|(name, _)| name.to_string())
            .collect();
        let aggregate = AggregateStats::compute(&windows, self.config.search.metric, &tuned);
        info!(
            windows = aggregate.total_windows,
            successful = aggregate.successful_windows,
            skipped = aggregate.skipped_windows,
            mean_test_return = ?aggregate.mean_test_return,
            mean_robustness = ?aggregate.mean_robustness,
            stability = ?aggregate.stability,
            "walk-forward run complete"
        );

        Ok(WfoRun {
            metric: self.config.search.metric,
            total_bars: series.len(),
            candidates: candidates.len(),
            splits_overlap: overlap,
            windows,
            aggregate,
        })
    }

    fn process_window(&self, split: Split, inputs: &RunInputs<'_>) -> WindowResult {
        let mut stage = WindowStage::Split(split);
        loop {
            stage = match stage {
                WindowStage::Record(result) => return result,
                other => {
                    debug!(window = split.index, stage = other.name(), "window stage");
                    self.advance(other, inputs)
                }
            };
        }
    }

    fn advance(&self, stage: WindowStage, inputs: &RunInputs<'_>) -> WindowStage {
        match stage {
            WindowStage::Split(split) => {
                let train = inputs.series.slice(split.train_range());
                let regimes = match inputs.regimes {
                    Some(context) => {
                        RegimeContext::new(context.labels()[split.train_range()].to_vec())
                    }
                    None => RegimeContext::new(self.classifier.classify_series(&train)),
                };
                WindowStage::OptimizeTrain {
                    split,
                    train,
                    regimes,
                }
            }
            WindowStage::OptimizeTrain {
                split,
                train,
                regimes,
            } => {
                let context = self.config.search.regime_aware.then_some(&regimes);
                let outcome = self.search.search(
                    &train,
                    inputs.candidates,
                    self.config.search.metric,
                    context,
                );
                if outcome.is_exhausted() {
                    WindowStage::Failed {
                        split,
                        regimes,
                        outcome,
                    }
                } else {
                    WindowStage::EvaluateTest {
                        split,
                        train,
                        regimes,
                        outcome,
                    }
                }
            }
            WindowStage::Failed {
                split,
                regimes,
                outcome,
            } => WindowStage::Record(self.record_skipped(&split, inputs, &regimes, outcome)),
            WindowStage::EvaluateTest {
                split,
                train,
                regimes,
                outcome,
            } => WindowStage::Record(self.record_tested(&split, inputs, &train, &regimes, outcome)),
            record @ WindowStage::Record(_) => record,
        }
    }

    fn record_skipped(
        &self,
        split: &Split,
        inputs: &RunInputs<'_>,
        regimes: &RegimeContext,
        outcome: SearchOutcome,
    ) -> WindowResult {
        let reason = format!(
            "no valid parameter set ({} evaluated, {} invalid, {} worker failures)",
            outcome.stats.evaluated, outcome.stats.invalid, outcome.stats.worker_failures
        );
        warn!(window = split.index, %reason, "window skipped");
        WindowResult {
            train_regime: regimes.predominant(self.config.regime.trending_threshold),
            regime_summary: regimes.summary(),
            skipped: true,
            skip_reason: Some(reason),
            search: outcome.stats,
            ..WindowResult::from_split(split, inputs.series)
        }
    }

    fn record_tested(
        &self,
        split: &Split,
        inputs: &RunInputs<'_>,
        train: &TimeSeries,
        regimes: &RegimeContext,
        outcome: SearchOutcome,
    ) -> WindowResult {
        let metric = self.config.search.metric;
        let train_regime = regimes.predominant(self.config.regime.trending_threshold);
        let regime_aware = self.config.search.regime_aware;

        let bucket = RegimeBucket::from_regime(train_regime)
            .filter(|_| regime_aware)
            .filter(|b| outcome.best_for(*b).is_some())
            .unwrap_or(RegimeBucket::Overall);
        let chosen = outcome
            .best_for(bucket)
            .or(outcome.best_overall.as_ref())
            .map(|best| best.params.clone());

        let scope = match train_regime {
            SimpleRegime::Unknown => EvaluationScope::default(),
            _ if !regime_aware => EvaluationScope::default(),
            regime => EvaluationScope::regime(regime.representative()),
        };

        let test = inputs.series.slice(split.test_range());
        let evaluator = self.search.evaluator();
        let (train_result, test_result) = match &chosen {
            Some(params) => (
                Some(evaluator.evaluate_scoped(train, params, &scope)),
                Some(evaluator.evaluate_scoped(&test, params, &scope)),
            ),
            None => (None, None),
        };
        let valid_score = |r: &Option<EvaluationResult>| {
            r.as_ref().filter(|r| r.is_valid()).map(|r| r.score(metric))
        };
        let train_score = valid_score(&train_result);
        let test_score = valid_score(&test_result);
        let robustness = match (train_score, test_score) {
            (Some(train), Some(test)) => robustness_ratio(train, test),
            _ => None,
        };

        debug!(
            window = split.index,
            regime = %train_regime,
            bucket = bucket.as_str(),
            train_score = ?train_score,
            test_score = ?test_score,
            robustness = ?robustness,
            "window evaluated"
        );

        let SearchOutcome {
            best_overall,
            best_by_regime,
            stats,
        } = outcome;
        WindowResult {
            best_score: best_overall.as_ref().map(|b| b.score),
            best_params: best_overall.map(|b| b.params),
            best_by_regime,
            test_params: chosen,
            test_bucket: Some(bucket),
            train_regime,
            regime_summary: regimes.summary(),
            train_result,
            test_result,
            train_score,
            test_score,
            robustness,
            search: stats,
            ..WindowResult::from_split(split, inputs.series)
        }
    }
}

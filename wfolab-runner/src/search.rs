//! Parallel parameter search over an expanded grid.
//!
//! Every candidate is scored on a fixed-size rayon pool. Workers share only
//! immutable borrows of the window and hand back plain results; selection
//! happens afterwards on the calling thread, in grid order, so ties go to
//! the earliest candidate.
//!
//! With a regime context the selection is repeated per bucket (trending,
//! ranging): entries are masked to the bucket's bars and parameters are
//! adapted to the bucket's representative label.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use wfolab_core::regime::SimpleRegime;
use wfolab_core::signal::adapt_params;
use wfolab_core::{ParameterSet, RegimeContext, TimeSeries};

use crate::evaluator::{Evaluate, EvaluationResult, EvaluationScope, InvalidReason};
use crate::fitness::ScoreMetric;
use crate::metrics::EvaluationMetrics;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub metric: ScoreMetric,
    /// Worker threads; `None` uses every core.
    pub workers: Option<usize>,
    /// Also pick a best set per regime bucket.
    pub regime_aware: bool,
    /// Buckets with fewer bars than this are skipped.
    pub min_regime_bars: usize,
    /// Grids expanding beyond this many combinations are rejected.
    pub max_grid_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            metric: ScoreMetric::default(),
            workers: None,
            regime_aware: true,
            min_regime_bars: 20,
            max_grid_size: 512,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to build search thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

// ─── Outcome ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeBucket {
    Overall,
    Trending,
    Ranging,
}

impl RegimeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overall => "overall",
            Self::Trending => "trending",
            Self::Ranging => "ranging",
        }
    }

    pub fn regime(&self) -> Option<SimpleRegime> {
        match self {
            Self::Overall => None,
            Self::Trending => Some(SimpleRegime::Trending),
            Self::Ranging => Some(SimpleRegime::Ranging),
        }
    }

    pub fn from_regime(regime: SimpleRegime) -> Option<Self> {
        match regime {
            SimpleRegime::Trending => Some(Self::Trending),
            SimpleRegime::Ranging => Some(Self::Ranging),
            SimpleRegime::Unknown => None,
        }
    }
}

/// Winner of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeBest {
    /// The grid member that won.
    pub params: ParameterSet,
    /// `params` after adaptation to the bucket's regime (equal for Overall).
    pub adapted: ParameterSet,
    pub score: f64,
    pub metrics: EvaluationMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub evaluated: usize,
    pub valid: usize,
    pub invalid: usize,
    pub worker_failures: usize,
}

impl SearchStats {
    fn absorb(&mut self, results: &[EvaluationResult]) {
        for result in results {
            self.evaluated += 1;
            match result {
                EvaluationResult::Valid(_) => self.valid += 1,
                EvaluationResult::Invalid(InvalidReason::WorkerFailure { .. }) => {
                    self.invalid += 1;
                    self.worker_failures += 1;
                }
                EvaluationResult::Invalid(_) => self.invalid += 1,
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub best_overall: Option<RegimeBest>,
    /// Includes `Overall` whenever `best_overall` is set.
    pub best_by_regime: BTreeMap<RegimeBucket, RegimeBest>,
    pub stats: SearchStats,
}

impl SearchOutcome {
    pub fn is_exhausted(&self) -> bool {
        self.best_overall.is_none()
    }

    pub fn best_for(&self, bucket: RegimeBucket) -> Option<&RegimeBest> {
        self.best_by_regime.get(&bucket)
    }

    /// `(best params, best score, best per bucket)`; all `None` when nothing
    /// scored validly.
    pub fn into_parts(
        self,
    ) -> (
        Option<ParameterSet>,
        Option<f64>,
        Option<BTreeMap<RegimeBucket, RegimeBest>>,
    ) {
        match self.best_overall {
            Some(best) => (Some(best.params), Some(best.score), Some(self.best_by_regime)),
            None => (None, None, None),
        }
    }
}

// ─── Search ──────────────────────────────────────────────────────────

pub struct ParameterSearch<E> {
    evaluator: E,
    pool: rayon::ThreadPool,
    min_regime_bars: usize,
}

impl<E: Evaluate> ParameterSearch<E> {
    /// `workers = None` sizes the pool to the machine.
    pub fn new(evaluator: E, workers: Option<usize>) -> Result<Self, SearchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.unwrap_or(0))
            .thread_name(|i| format!("wfolab-search-{i}"))
            .build()?;
        Ok(Self {
            evaluator,
            pool,
            min_regime_bars: SearchConfig::default().min_regime_bars,
        })
    }

    pub fn from_config(evaluator: E, config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self::new(evaluator, config.workers)?.with_min_regime_bars(config.min_regime_bars))
    }

    pub fn with_min_regime_bars(mut self, bars: usize) -> Self {
        self.min_regime_bars = bars;
        self
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Score every candidate on `window` and pick the best by `metric`.
    pub fn search(
        &self,
        window: &TimeSeries,
        grid: &[ParameterSet],
        metric: ScoreMetric,
        regime_context: Option<&RegimeContext>,
    ) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        if grid.is_empty() {
            debug!("empty grid, nothing to search");
            return outcome;
        }

        let results = self.score_all(window, grid, &EvaluationScope::default());
        outcome.stats.absorb(&results);
        outcome.best_overall = select(grid, &results, metric).map(|(params, score, metrics)| {
            RegimeBest {
                params: params.clone(),
                adapted: params.clone(),
                score,
                metrics,
            }
        });
        let Some(overall) = outcome.best_overall.clone() else {
            debug!(candidates = grid.len(), "search exhausted: no valid candidate");
            return outcome;
        };
        outcome.best_by_regime.insert(RegimeBucket::Overall, overall);

        if let Some(context) = regime_context {
            if context.len() != window.len() {
                warn!(
                    context_bars = context.len(),
                    window_bars = window.len(),
                    "regime context does not match window, ignoring it"
                );
            } else {
                for bucket in [RegimeBucket::Trending, RegimeBucket::Ranging] {
                    let best =
                        self.search_bucket(window, grid, metric, context, bucket, &mut outcome.stats);
                    if let Some(best) = best {
                        outcome.best_by_regime.insert(bucket, best);
                    }
                }
            }
        }

        debug!(
            evaluated = outcome.stats.evaluated,
            valid = outcome.stats.valid,
            invalid = outcome.stats.invalid,
            worker_failures = outcome.stats.worker_failures,
            buckets = outcome.best_by_regime.len(),
            "search complete"
        );
        outcome
    }

    fn search_bucket(
        &self,
        window: &TimeSeries,
        grid: &[ParameterSet],
        metric: ScoreMetric,
        context: &RegimeContext,
        bucket: RegimeBucket,
        stats: &mut SearchStats,
    ) -> Option<RegimeBest> {
        let regime = bucket.regime()?;
        let bars = context.bar_count(regime);
        if bars < self.min_regime_bars {
            debug!(
                bucket = bucket.as_str(),
                bars,
                min = self.min_regime_bars,
                "skipping regime bucket"
            );
            return None;
        }
        let mask = context.mask(regime);
        let label = regime.representative();
        let scope = EvaluationScope::masked(label, &mask);
        let results = self.score_all(window, grid, &scope);
        stats.absorb(&results);
        let (params, score, metrics) = select(grid, &results, metric)?;
        // A set the evaluator scored valid parses; the fallback only covers
        // evaluators that skip parameter validation.
        let adapted = match adapt_params(params, Some(label)) {
            Ok(adapted) => adapted,
            Err(error) => {
                warn!(
                    bucket = bucket.as_str(),
                    params = %params.label(),
                    %error,
                    "regime adaptation failed, keeping unadapted params"
                );
                params.clone()
            }
        };
        Some(RegimeBest {
            params: params.clone(),
            adapted,
            score,
            metrics,
        })
    }

    /// One result per candidate, in grid order.
    fn score_all(
        &self,
        window: &TimeSeries,
        grid: &[ParameterSet],
        scope: &EvaluationScope<'_>,
    ) -> Vec<EvaluationResult> {
        self.pool.install(|| {
            grid.par_iter()
                .map(|params| self.guarded(window, params, scope))
                .collect()
        })
    }

    /// A panicking evaluation becomes `WorkerFailure` instead of tearing
    /// down the pool.
    fn guarded(
        &self,
        window: &TimeSeries,
        params: &ParameterSet,
        scope: &EvaluationScope<'_>,
    ) -> EvaluationResult {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluator.evaluate_scoped(window, params, scope)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(params = %params.label(), %message, "evaluation worker panicked");
            EvaluationResult::Invalid(InvalidReason::WorkerFailure { message })
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// First candidate with the strictly highest score among valid results.
fn select<'g>(
    grid: &'g [ParameterSet],
    results: &[EvaluationResult],
    metric: ScoreMetric,
) -> Option<(&'g ParameterSet, f64, EvaluationMetrics)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, result) in results.iter().enumerate() {
        let Some(metrics) = result.metrics() else {
            continue;
        };
        let score = metric.extract(metrics);
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, incumbent)) if !metric.is_better(score, incumbent) => {}
            _ => best = Some((i, score)),
        }
    }
    let (i, score) = best?;
    let metrics = results[i].metrics()?.clone();
    Some((&grid[i], score, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfolab_core::regime::RegimeLabel;
    use wfolab_core::synthetic::zigzag_series;
    use wfolab_core::ParamValue;

    /// Scores a candidate by its `bb_std`; panics on `bb_std == 13`.
    struct ByStd;

    impl Evaluate for ByStd {
        fn evaluate_scoped(
            &self,
            window: &TimeSeries,
            params: &ParameterSet,
            scope: &EvaluationScope<'_>,
        ) -> EvaluationResult {
            let std = params.get("bb_std").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if std == 13.0 {
                panic!("boom");
            }
            if std < 0.0 {
                return EvaluationResult::Invalid(InvalidReason::NoTrades);
            }
            let bonus = match scope.regime {
                Some(RegimeLabel::Ranging) => 100.0,
                _ => 0.0,
            };
            EvaluationResult::Valid(EvaluationMetrics {
                total_return: std + bonus,
                max_drawdown: 0.0,
                trade_count: window.len(),
                win_rate: 0.5,
                sharpe: std + bonus,
                profit_factor: 1.0,
                avg_bars_held: 1.0,
                strictness_used: None,
            })
        }
    }

    fn grid(stds: &[f64]) -> Vec<ParameterSet> {
        stds.iter()
            .map(|&s| ParameterSet::new().with("bb_std", s))
            .collect()
    }

    fn search() -> ParameterSearch<ByStd> {
        ParameterSearch::new(ByStd, Some(2)).unwrap()
    }

    #[test]
    fn picks_highest_score() {
        let window = zigzag_series(50, 100.0, 10, 1.0);
        let outcome = search().search(&window, &grid(&[1.0, 3.0, 2.0]), ScoreMetric::Sharpe, None);
        let (params, score, by_regime) = outcome.into_parts();
        assert_eq!(params.unwrap().get("bb_std").and_then(|v| v.as_f64()), Some(3.0));
        assert_eq!(score, Some(3.0));
        assert_eq!(by_regime.unwrap().len(), 1);
    }

    #[test]
    fn ties_resolve_to_grid_order() {
        let window = zigzag_series(50, 100.0, 10, 1.0);
        let candidates = vec![
            ParameterSet::new().with("bb_std", 2.0).with("rsi_period", 10_i64),
            ParameterSet::new().with("bb_std", 2.0).with("rsi_period", 20_i64),
        ];
        let outcome = search().search(&window, &candidates, ScoreMetric::Sharpe, None);
        assert_eq!(outcome.best_overall.unwrap().params, candidates[0]);
    }

    #[test]
    fn empty_grid_is_all_none() {
        let window = zigzag_series(50, 100.0, 10, 1.0);
        let outcome = search().search(&window, &[], ScoreMetric::Sharpe, None);
        assert_eq!(outcome.into_parts(), (None, None, None));
    }

    #[test]
    fn all_invalid_is_all_none() {
        let window = zigzag_series(50, 100.0, 10, 1.0);
        let outcome = search().search(&window, &grid(&[-1.0, -2.0]), ScoreMetric::Sharpe, None);
        assert_eq!(outcome.stats.invalid, 2);
        assert_eq!(outcome.into_parts(), (None, None, None));
    }

    #[test]
    fn panicking_worker_is_counted_not_fatal() {
        let window = zigzag_series(50, 100.0, 10, 1.0);
        let outcome = search().search(&window, &grid(&[13.0, 1.0]), ScoreMetric::Sharpe, None);
        assert_eq!(outcome.stats.worker_failures, 1);
        assert_eq!(outcome.best_overall.unwrap().score, 1.0);
    }

    #[test]
    fn regime_buckets_use_adapted_scope() {
        let window = zigzag_series(60, 100.0, 10, 1.0);
        let labels: Vec<_> = (0..60)
            .map(|i| if i < 30 { RegimeLabel::TrendingUp } else { RegimeLabel::Ranging })
            .collect();
        let context = RegimeContext::new(labels);
        let outcome = search().with_min_regime_bars(10).search(
            &window,
            &grid(&[1.0, 2.0]),
            ScoreMetric::Sharpe,
            Some(&context),
        );
        assert_eq!(outcome.best_by_regime.len(), 3);
        assert_eq!(outcome.best_for(RegimeBucket::Ranging).unwrap().score, 102.0);
        assert_eq!(outcome.best_for(RegimeBucket::Trending).unwrap().score, 2.0);
    }

    #[test]
    fn bucket_winner_carries_adapted_params() {
        let window = zigzag_series(60, 100.0, 10, 1.0);
        let labels: Vec<_> = (0..60)
            .map(|i| if i < 30 { RegimeLabel::TrendingUp } else { RegimeLabel::Ranging })
            .collect();
        let context = RegimeContext::new(labels);
        let candidates = vec![ParameterSet::new()
            .with("bb_std", 2.0)
            .with("use_regime_filter", true)
            .with("use_trend_filter", true)];
        let outcome = search().with_min_regime_bars(10).search(
            &window,
            &candidates,
            ScoreMetric::Sharpe,
            Some(&context),
        );
        let ranging = outcome.best_for(RegimeBucket::Ranging).unwrap();
        assert_eq!(ranging.params, candidates[0]);
        assert_eq!(ranging.adapted.get("use_trend_filter"), Some(&ParamValue::from(false)));
    }

    #[test]
    fn unparseable_bucket_winner_keeps_its_params() {
        let window = zigzag_series(60, 100.0, 10, 1.0);
        let context = RegimeContext::new(vec![RegimeLabel::Ranging; 60]);
        // valid for ByStd, rejected by StrategyParams (lower above upper)
        let candidates = vec![ParameterSet::new()
            .with("bb_std", 2.0)
            .with("rsi_lower_threshold", 90.0)];
        let outcome = search().search(&window, &candidates, ScoreMetric::Sharpe, Some(&context));
        let ranging = outcome.best_for(RegimeBucket::Ranging).unwrap();
        assert_eq!(ranging.adapted, candidates[0]);
    }

    #[test]
    fn small_buckets_are_skipped() {
        let window = zigzag_series(60, 100.0, 10, 1.0);
        let mut labels = vec![RegimeLabel::Ranging; 60];
        labels[0] = RegimeLabel::TrendingDown;
        let context = RegimeContext::new(labels);
        let outcome = search().search(&window, &grid(&[1.0]), ScoreMetric::Sharpe, Some(&context));
        assert!(outcome.best_for(RegimeBucket::Trending).is_none());
        assert!(outcome.best_for(RegimeBucket::Ranging).is_some());
    }

    #[test]
    fn mismatched_context_is_ignored() {
        let window = zigzag_series(60, 100.0, 10, 1.0);
        let context = RegimeContext::new(vec![RegimeLabel::Ranging; 10]);
        let outcome = search().search(&window, &grid(&[1.0]), ScoreMetric::Sharpe, Some(&context));
        assert_eq!(outcome.best_by_regime.len(), 1);
    }
}

//! Strategy evaluator — one ParameterSet on one window, scored.
//!
//! Pipeline: resolve params → regime adaptation → FeatureFrame → signals with
//! escalation → simplified ledger → metrics → policy floors. Every failure
//! mode comes back as `EvaluationResult::Invalid`; nothing here panics or
//! returns an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wfolab_core::regime::RegimeLabel;
use wfolab_core::signal::{adapt, escalate};
use wfolab_core::{FeatureFrame, ParameterSet, SignalError, StrategyParams, TimeSeries};

use crate::costs::CostModel;
use crate::fitness::ScoreMetric;
use crate::ledger::run_ledger;
use crate::metrics::{EvaluationMetrics, DEFAULT_PERIODS_PER_YEAR};

/// Score assigned to invalid evaluations. Loses every comparison.
pub const INVALID_SCORE: f64 = f64::NEG_INFINITY;

// ─── Results ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidReason {
    #[error("invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("window has {bars} bars, features need more than {warmup}")]
    InsufficientBars { bars: usize, warmup: usize },

    #[error("required feature '{feature}' is missing or empty")]
    MissingFeature { feature: String },

    #[error("zone flags cover {got} bars, window has {expected}")]
    ZoneMismatch { expected: usize, got: usize },

    #[error("no trades")]
    NoTrades,

    #[error("{trades} trades, policy requires {min}")]
    TooFewTrades { trades: usize, min: usize },

    #[error("max drawdown {drawdown:.4} exceeds {limit:.4}")]
    ExcessiveDrawdown { drawdown: f64, limit: f64 },

    #[error("win rate {win_rate:.4} below {floor:.4}")]
    LowWinRate { win_rate: f64, floor: f64 },

    #[error("evaluation worker failed: {message}")]
    WorkerFailure { message: String },
}

impl From<SignalError> for InvalidReason {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::MissingFeature(feature) => Self::MissingFeature {
                feature: feature.to_string(),
            },
            SignalError::ZoneLength { expected, got } => Self::ZoneMismatch { expected, got },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum EvaluationResult {
    Valid(EvaluationMetrics),
    Invalid(InvalidReason),
}

impl EvaluationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn metrics(&self) -> Option<&EvaluationMetrics> {
        match self {
            Self::Valid(m) => Some(m),
            Self::Invalid(_) => None,
        }
    }

    pub fn invalid_reason(&self) -> Option<&InvalidReason> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(reason) => Some(reason),
        }
    }

    /// Metric value, or [`INVALID_SCORE`] for invalid results.
    pub fn score(&self, metric: ScoreMetric) -> f64 {
        self.metrics()
            .map(|m| metric.extract(m))
            .unwrap_or(INVALID_SCORE)
    }
}

// ─── Policy ──────────────────────────────────────────────────────────

/// Validity floors applied after metrics are computed.
///
/// Zero trades is always invalid, whatever the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationPolicy {
    pub min_trades: usize,
    /// Largest acceptable drawdown as a positive fraction.
    pub max_drawdown: Option<f64>,
    pub min_win_rate: Option<f64>,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            min_trades: 5,
            max_drawdown: Some(0.30),
            min_win_rate: Some(0.30),
        }
    }
}

impl EvaluationPolicy {
    /// Only the zero-trades check remains.
    pub fn relaxed() -> Self {
        Self {
            min_trades: 1,
            max_drawdown: None,
            min_win_rate: None,
        }
    }

    pub fn check(&self, metrics: &EvaluationMetrics) -> Result<(), InvalidReason> {
        if metrics.trade_count == 0 {
            return Err(InvalidReason::NoTrades);
        }
        if metrics.trade_count < self.min_trades {
            return Err(InvalidReason::TooFewTrades {
                trades: metrics.trade_count,
                min: self.min_trades,
            });
        }
        if let Some(limit) = self.max_drawdown {
            if metrics.max_drawdown > limit {
                return Err(InvalidReason::ExcessiveDrawdown {
                    drawdown: metrics.max_drawdown,
                    limit,
                });
            }
        }
        if let Some(floor) = self.min_win_rate {
            if metrics.win_rate < floor {
                return Err(InvalidReason::LowWinRate {
                    win_rate: metrics.win_rate,
                    floor,
                });
            }
        }
        Ok(())
    }
}

// ─── Evaluation ──────────────────────────────────────────────────────

/// Regime context for a single evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationScope<'a> {
    /// Label the parameters are adapted to (when they opt in).
    pub regime: Option<RegimeLabel>,
    /// Entries outside the mask are dropped before trading.
    pub entry_mask: Option<&'a [bool]>,
}

impl<'a> EvaluationScope<'a> {
    pub fn regime(regime: RegimeLabel) -> Self {
        Self {
            regime: Some(regime),
            entry_mask: None,
        }
    }

    pub fn masked(regime: RegimeLabel, mask: &'a [bool]) -> Self {
        Self {
            regime: Some(regime),
            entry_mask: Some(mask),
        }
    }
}

/// The seam between search and evaluation.
pub trait Evaluate: Send + Sync {
    fn evaluate_scoped(
        &self,
        window: &TimeSeries,
        params: &ParameterSet,
        scope: &EvaluationScope<'_>,
    ) -> EvaluationResult;

    fn evaluate(&self, window: &TimeSeries, params: &ParameterSet) -> EvaluationResult {
        self.evaluate_scoped(window, params, &EvaluationScope::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyEvaluator {
    pub policy: EvaluationPolicy,
    pub costs: CostModel,
    /// Escalation target: the ladder loosens until this many entries exist.
    pub min_entry_signals: usize,
    pub periods_per_year: f64,
}

impl Default for StrategyEvaluator {
    fn default() -> Self {
        Self {
            policy: EvaluationPolicy::default(),
            costs: CostModel::default(),
            min_entry_signals: 5,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

impl StrategyEvaluator {
    pub fn new(policy: EvaluationPolicy, costs: CostModel) -> Self {
        Self {
            policy,
            costs,
            ..Self::default()
        }
    }

    fn run(
        &self,
        window: &TimeSeries,
        params: &ParameterSet,
        scope: &EvaluationScope<'_>,
    ) -> Result<EvaluationMetrics, InvalidReason> {
        let typed = StrategyParams::from_set(params).map_err(|e| InvalidReason::InvalidParams {
            message: e.to_string(),
        })?;
        let adapted = adapt(&typed, scope.regime);

        let spec = adapted.feature_spec();
        let warmup = spec.warmup();
        if window.len() <= warmup {
            return Err(InvalidReason::InsufficientBars {
                bars: window.len(),
                warmup,
            });
        }

        let frame = FeatureFrame::compute(window, &spec);
        let signals = escalate(&frame, &adapted, self.min_entry_signals, scope.entry_mask)?;
        let ledger = run_ledger(&window.closes(), &signals, &self.costs);
        let metrics = EvaluationMetrics {
            strictness_used: Some(signals.strictness),
            ..EvaluationMetrics::compute(&ledger.equity_curve, &ledger.trades, self.periods_per_year)
        };
        self.policy.check(&metrics)?;
        Ok(metrics)
    }
}

impl Evaluate for StrategyEvaluator {
    fn evaluate_scoped(
        &self,
        window: &TimeSeries,
        params: &ParameterSet,
        scope: &EvaluationScope<'_>,
    ) -> EvaluationResult {
        match self.run(window, params, scope) {
            Ok(metrics) => EvaluationResult::Valid(metrics),
            Err(reason) => EvaluationResult::Invalid(reason),
        }
    }
}

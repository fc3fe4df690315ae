//! Score metric — configurable selector for ranking parameter sets.
//!
//! Every metric is oriented so that higher is better; drawdown is negated.

use serde::{Deserialize, Serialize};

use crate::metrics::EvaluationMetrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    TotalReturn,
    #[default]
    Sharpe,
    ProfitFactor,
    WinRate,
    /// Negated max drawdown: -0.05 beats -0.20.
    MaxDrawdown,
    /// Total return divided by max drawdown (total return when flat).
    ReturnOverDrawdown,
}

impl ScoreMetric {
    pub fn extract(&self, metrics: &EvaluationMetrics) -> f64 {
        match self {
            Self::TotalReturn => metrics.total_return,
            Self::Sharpe => metrics.sharpe,
            Self::ProfitFactor => metrics.profit_factor,
            Self::WinRate => metrics.win_rate,
            Self::MaxDrawdown => -metrics.max_drawdown,
            Self::ReturnOverDrawdown => {
                if metrics.max_drawdown < 1e-12 {
                    metrics.total_return
                } else {
                    metrics.total_return / metrics.max_drawdown
                }
            }
        }
    }

    /// True if `a` is strictly better than `b`. Ties keep the incumbent.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalReturn => "total_return",
            Self::Sharpe => "sharpe",
            Self::ProfitFactor => "profit_factor",
            Self::WinRate => "win_rate",
            Self::MaxDrawdown => "max_drawdown",
            Self::ReturnOverDrawdown => "return_over_drawdown",
        }
    }
}

impl std::fmt::Display for ScoreMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

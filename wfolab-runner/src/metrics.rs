//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! No dependencies on the search or orchestration layers.

use serde::{Deserialize, Serialize};
use wfolab_core::Strictness;

use crate::ledger::Trade;

/// Default annualization factor for per-bar returns.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Aggregate performance metrics for a single evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub total_return: f64,
    /// Positive fraction, e.g. 0.15 for a 15% peak-to-trough decline.
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub win_rate: f64,
    pub sharpe: f64,
    pub profit_factor: f64,
    pub avg_bars_held: f64,
    /// Ladder level whose signals produced these trades, when known.
    #[serde(default)]
    pub strictness_used: Option<Strictness>,
}

impl EvaluationMetrics {
    /// Compute all metrics from an equity curve and trade list.
    pub fn compute(equity_curve: &[f64], trades: &[Trade], periods_per_year: f64) -> Self {
        Self {
            total_return: total_return(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            trade_count: trades.len(),
            win_rate: win_rate(trades),
            sharpe: sharpe_ratio(equity_curve, periods_per_year),
            profit_factor: profit_factor(trades),
            avg_bars_held: avg_bars_held(trades),
            strictness_used: None,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    (final_eq - initial) / initial
}

/// Annualized Sharpe ratio from per-bar returns.
///
/// Sharpe = mean(returns) / std(returns) * sqrt(periods_per_year).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * periods_per_year.max(1.0).sqrt()
}

/// Maximum drawdown as a positive fraction (0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Win rate: fraction of trades with a positive net return.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross gains / gross losses over trade returns.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.net_return > 0.0)
        .map(|t| t.net_return)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_return < 0.0)
        .map(|t| t.net_return.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

pub fn avg_bars_held(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_held as f64).sum::<f64>() / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Bar-over-bar returns from an equity curve.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Coefficient of variation: std / |mean|. `None` when the mean is ~0.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = mean_f64(values);
    if mean.abs() < 1e-12 {
        return None;
    }
    Some(std_dev(values) / mean.abs())
}

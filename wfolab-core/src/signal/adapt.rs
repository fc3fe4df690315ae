//! Regime adaptation: fixed per-regime parameter deltas, clamped.

use crate::params::{ParamError, ParameterSet, StrategyParams};
use crate::regime::RegimeLabel;

const RSI_BOUNDS: (f64, f64) = (25.0, 75.0);
const ZONE_BOUNDS: (f64, f64) = (0.0, 1.0);
const BB_STD_BOUNDS: (f64, f64) = (1.0, 3.5);

const RSI_DELTA: f64 = 5.0;
const ZONE_DELTA: f64 = 0.2;
const BB_STD_DELTA: f64 = 0.5;

/// Typed adaptation. Returns `base` unchanged unless `use_regime_filter` is
/// set and `regime` is known.
pub fn adapt(base: &StrategyParams, regime: Option<RegimeLabel>) -> StrategyParams {
    let Some(regime) = regime.filter(|_| base.use_regime_filter) else {
        return base.clone();
    };
    let mut p = base.clone();
    match regime {
        RegimeLabel::TrendingUp
        | RegimeLabel::TrendingDown
        | RegimeLabel::Breakout
        | RegimeLabel::Breakdown => {
            shift_rsi(&mut p, -RSI_DELTA, RSI_DELTA);
            p.min_hold_period += 1;
        }
        RegimeLabel::Ranging => {
            shift_rsi(&mut p, RSI_DELTA, -RSI_DELTA);
            p.use_trend_filter = false;
            p.zone_influence = clamp(p.zone_influence + ZONE_DELTA, ZONE_BOUNDS);
        }
        RegimeLabel::VolatileRange => {
            p.bb_std = clamp(p.bb_std + BB_STD_DELTA, BB_STD_BOUNDS);
            p.min_hold_period += 1;
        }
        RegimeLabel::Unknown => {}
    }
    p
}

/// Adapt a ParameterSet, producing a new instance.
///
/// With the filter off or no regime the result equals `base` exactly,
/// including names `base` left to defaults.
pub fn adapt_params(
    base: &ParameterSet,
    regime: Option<RegimeLabel>,
) -> Result<ParameterSet, ParamError> {
    let typed = StrategyParams::from_set(base)?;
    let adapted = adapt(&typed, regime);
    if adapted == typed {
        return Ok(base.clone());
    }
    Ok(base.merged(&adapted.to_set()))
}

/// Keep the thresholds ordered; an adjustment that would cross them is dropped.
fn shift_rsi(p: &mut StrategyParams, lower_delta: f64, upper_delta: f64) {
    let lower = clamp(p.rsi_lower_threshold + lower_delta, RSI_BOUNDS);
    let upper = clamp(p.rsi_upper_threshold + upper_delta, RSI_BOUNDS);
    if lower < upper {
        p.rsi_lower_threshold = lower;
        p.rsi_upper_threshold = upper;
    }
}

fn clamp(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}

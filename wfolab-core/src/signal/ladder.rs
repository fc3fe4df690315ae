//! The strictness ladder and its escalation loop.
//!
//! Per bar, for the long side (short mirrors):
//! - `A`: RSI below the lower threshold, widened at looser levels
//! - `B`: close at or below the lower band (middle band at UltraRelaxed)
//! - `T`: trend filter; fails only when ADX is strong and −DI dominates
//!
//! | level        | entry core  |
//! |--------------|-------------|
//! | Strict       | A ∧ B ∧ T   |
//! | Balanced     | A ∧ (B ∨ T) |
//! | Relaxed      | A ∨ B       |
//! | UltraRelaxed | A′ ∨ B′     |

use super::{SignalError, SignalSet, Strictness};
use crate::features::{Feature, FeatureFrame};
use crate::params::StrategyParams;

const CORE_FEATURES: &[Feature] = &[
    Feature::Close,
    Feature::Rsi,
    Feature::BbUpper,
    Feature::BbMiddle,
    Feature::BbLower,
];

const TREND_FEATURES: &[Feature] = &[Feature::Adx, Feature::PlusDi, Feature::MinusDi];

/// Zone influence at or above this composes the zone term with OR.
const ZONE_OR_THRESHOLD: f64 = 0.5;

/// Generate signals at `params.strictness`. Deterministic.
pub fn generate(frame: &FeatureFrame, params: &StrategyParams) -> Result<SignalSet, SignalError> {
    check_inputs(frame, params)?;
    Ok(build(frame, params, params.strictness, None))
}

/// Walk the ladder from `params.strictness` until a level yields at least
/// `min_entries` entries. UltraRelaxed is always accepted.
pub fn generate_with_escalation(
    frame: &FeatureFrame,
    params: &StrategyParams,
    min_entries: usize,
) -> Result<SignalSet, SignalError> {
    escalate(frame, params, min_entries, None)
}

/// Like [`generate_with_escalation`], but entries outside `entry_mask` are
/// cleared before counting.
pub fn escalate(
    frame: &FeatureFrame,
    params: &StrategyParams,
    min_entries: usize,
    entry_mask: Option<&[bool]>,
) -> Result<SignalSet, SignalError> {
    check_inputs(frame, params)?;
    let mut set = SignalSet::empty(frame.len(), params.strictness);
    for level in params.strictness.ladder_from() {
        set = build(frame, params, level, entry_mask);
        if set.entry_count() >= min_entries {
            break;
        }
    }
    if set.strictness != params.strictness {
        tracing::debug!(
            requested = %params.strictness,
            used = %set.strictness,
            entries = set.entry_count(),
            min_entries,
            "escalated signal strictness"
        );
    }
    Ok(set)
}

fn check_inputs(frame: &FeatureFrame, params: &StrategyParams) -> Result<(), SignalError> {
    frame
        .require(CORE_FEATURES)
        .map_err(SignalError::MissingFeature)?;
    if params.use_trend_filter {
        frame
            .require(TREND_FEATURES)
            .map_err(SignalError::MissingFeature)?;
    }
    if let Some(zones) = frame.zones() {
        for got in [zones.near_support.len(), zones.near_resistance.len()] {
            if got != frame.len() {
                return Err(SignalError::ZoneLength {
                    expected: frame.len(),
                    got,
                });
            }
        }
    }
    Ok(())
}

/// Inputs are validated; missing optional columns read as `NAN`.
fn build(
    frame: &FeatureFrame,
    params: &StrategyParams,
    level: Strictness,
    entry_mask: Option<&[bool]>,
) -> SignalSet {
    let n = frame.len();
    let at = |f: Feature, i: usize| frame.get(f, i).unwrap_or(f64::NAN);
    let widen = level.rsi_widening();
    let lower = params.rsi_lower_threshold + widen;
    let upper = params.rsi_upper_threshold - widen;
    let zones = frame.zones().filter(|_| params.zone_influence > 0.0);

    let mut set = SignalSet::empty(n, level);
    for i in 0..n {
        let rsi = at(Feature::Rsi, i);
        let close = at(Feature::Close, i);
        let bb_upper = at(Feature::BbUpper, i);
        let bb_lower = at(Feature::BbLower, i);
        let (band_long, band_short) = if level == Strictness::UltraRelaxed {
            let middle = at(Feature::BbMiddle, i);
            (middle, middle)
        } else {
            (bb_lower, bb_upper)
        };

        let a_long = rsi < lower;
        let a_short = rsi > upper;
        let b_long = close <= band_long;
        let b_short = close >= band_short;
        let (t_long, t_short) = if params.use_trend_filter {
            let strong = at(Feature::Adx, i) >= params.adx_threshold;
            let plus = at(Feature::PlusDi, i);
            let minus = at(Feature::MinusDi, i);
            (!(strong && minus > plus), !(strong && plus > minus))
        } else {
            (true, true)
        };

        let core = |a: bool, b: bool, t: bool| match level {
            Strictness::Strict => a && b && t,
            Strictness::Balanced => a && (b || t),
            Strictness::Relaxed | Strictness::UltraRelaxed => a || b,
        };
        let mut long = core(a_long, b_long, t_long);
        let mut short = core(a_short, b_short, t_short);

        if let Some(zones) = zones {
            let near_support = zones.near_support[i];
            let near_resistance = zones.near_resistance[i];
            if params.zone_influence < ZONE_OR_THRESHOLD {
                long = long && near_support;
                short = short && near_resistance;
            } else {
                long = long || (near_support && rsi < 50.0);
                short = short || (near_resistance && rsi > 50.0);
            }
        }

        if let Some(mask) = entry_mask {
            let allowed = mask.get(i).copied().unwrap_or(false);
            long &= allowed;
            short &= allowed;
        }

        set.long_entry[i] = long;
        set.short_entry[i] = short;
        set.long_exit[i] = rsi > params.rsi_upper_threshold || close >= bb_upper;
        set.short_exit[i] = rsi < params.rsi_lower_threshold || close <= bb_lower;
    }

    apply_min_hold(&mut set.long_entry, &mut set.long_exit, params.min_hold_period);
    apply_min_hold(&mut set.short_entry, &mut set.short_exit, params.min_hold_period);
    set
}

/// Suppress exits within `min_hold` bars after an entry, then clear any entry
/// that still shares its bar with an exit.
fn apply_min_hold(entry: &mut [bool], exit: &mut [bool], min_hold: usize) {
    let mut last_entry: Option<usize> = None;
    for i in 0..entry.len() {
        if exit[i] && last_entry.is_some_and(|e| i > e && i - e <= min_hold) {
            exit[i] = false;
        }
        if exit[i] {
            entry[i] = false;
        }
        if entry[i] {
            last_entry = Some(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ZoneFlags;

    /// Frame with flat bands far from price and no trend columns.
    fn frame_with_rsi(rsi: &[f64]) -> FeatureFrame {
        let n = rsi.len();
        let mut frame = FeatureFrame::with_len(n);
        frame.insert(Feature::Close, vec![100.0; n]);
        frame.insert(Feature::Rsi, rsi.to_vec());
        frame.insert(Feature::BbUpper, vec![120.0; n]);
        frame.insert(Feature::BbMiddle, vec![110.0; n]);
        frame.insert(Feature::BbLower, vec![80.0; n]);
        frame
    }

    fn params(level: Strictness) -> StrategyParams {
        StrategyParams {
            use_trend_filter: false,
            strictness: level,
            min_hold_period: 0,
            ..StrategyParams::default()
        }
    }

    #[test]
    fn missing_rsi_is_an_error() {
        let frame = FeatureFrame::with_len(3);
        assert_eq!(
            generate(&frame, &params(Strictness::Balanced)),
            Err(SignalError::MissingFeature(Feature::Close))
        );
    }

    #[test]
    fn trend_filter_requires_adx() {
        let frame = frame_with_rsi(&[50.0; 4]);
        let p = StrategyParams {
            use_trend_filter: true,
            ..params(Strictness::Balanced)
        };
        assert_eq!(
            generate(&frame, &p),
            Err(SignalError::MissingFeature(Feature::Adx))
        );
    }

    #[test]
    fn balanced_enters_on_rsi_alone_without_filter() {
        let frame = frame_with_rsi(&[50.0, 25.0, 50.0, 75.0]);
        let set = generate(&frame, &params(Strictness::Balanced)).unwrap();
        assert_eq!(set.long_entry, vec![false, true, false, false]);
        assert_eq!(set.short_entry, vec![false, false, false, true]);
    }

    #[test]
    fn strict_needs_band_touch() {
        let frame = frame_with_rsi(&[25.0, 25.0]);
        let set = generate(&frame, &params(Strictness::Strict)).unwrap();
        assert_eq!(set.entry_count(), 0);
    }

    #[test]
    fn relaxed_widens_rsi_threshold() {
        // 33 is above 30 but inside the +5 widening
        let frame = frame_with_rsi(&[33.0]);
        assert_eq!(generate(&frame, &params(Strictness::Balanced)).unwrap().entry_count(), 0);
        assert_eq!(generate(&frame, &params(Strictness::Relaxed)).unwrap().entry_count(), 1);
    }

    #[test]
    fn ultra_uses_middle_band() {
        // close 100 is below the middle band (110) but above the lower band
        let frame = frame_with_rsi(&[50.0]);
        assert_eq!(generate(&frame, &params(Strictness::Relaxed)).unwrap().entry_count(), 0);
        let set = generate(&frame, &params(Strictness::UltraRelaxed)).unwrap();
        assert!(set.long_entry[0]);
    }

    #[test]
    fn trend_filter_blocks_against_strong_downtrend() {
        let mut frame = frame_with_rsi(&[25.0, 25.0]);
        frame.insert(Feature::BbLower, vec![101.0; 2]);
        frame.insert(Feature::Adx, vec![40.0, 10.0]);
        frame.insert(Feature::PlusDi, vec![10.0, 10.0]);
        frame.insert(Feature::MinusDi, vec![30.0, 30.0]);
        let p = StrategyParams {
            use_trend_filter: true,
            ..params(Strictness::Strict)
        };
        let set = generate(&frame, &p).unwrap();
        // bar 0: strong ADX with -DI dominant blocks the long
        assert_eq!(set.long_entry, vec![false, true]);
    }

    #[test]
    fn exit_wins_over_entry() {
        // RSI 25 triggers long entry; close above upper band triggers long exit
        let mut frame = frame_with_rsi(&[25.0]);
        frame.insert(Feature::BbUpper, vec![99.0]);
        let set = generate(&frame, &params(Strictness::Balanced)).unwrap();
        assert!(set.long_exit[0]);
        assert!(!set.long_entry[0]);
    }

    #[test]
    fn min_hold_suppresses_early_exits() {
        let frame = frame_with_rsi(&[25.0, 75.0, 75.0, 75.0]);
        let p = StrategyParams {
            min_hold_period: 2,
            ..params(Strictness::Balanced)
        };
        let set = generate(&frame, &p).unwrap();
        assert!(set.long_entry[0]);
        assert_eq!(set.long_exit, vec![false, false, false, true]);
    }

    #[test]
    fn zone_and_mode_requires_zone() {
        let mut frame = frame_with_rsi(&[25.0, 25.0]);
        frame.set_zones(ZoneFlags {
            near_support: vec![true, false],
            near_resistance: vec![false, false],
        });
        let p = StrategyParams {
            zone_influence: 0.3,
            ..params(Strictness::Balanced)
        };
        let set = generate(&frame, &p).unwrap();
        assert_eq!(set.long_entry, vec![true, false]);
    }

    #[test]
    fn zone_or_mode_adds_entries() {
        let mut frame = frame_with_rsi(&[45.0, 55.0]);
        frame.set_zones(ZoneFlags {
            near_support: vec![true, true],
            near_resistance: vec![false, false],
        });
        let p = StrategyParams {
            zone_influence: 0.7,
            ..params(Strictness::Balanced)
        };
        let set = generate(&frame, &p).unwrap();
        // RSI must still sit on the long side of 50
        assert_eq!(set.long_entry, vec![true, false]);
    }

    #[test]
    fn zero_zone_influence_ignores_zones() {
        let mut frame = frame_with_rsi(&[25.0]);
        frame.set_zones(ZoneFlags {
            near_support: vec![false],
            near_resistance: vec![false],
        });
        let set = generate(&frame, &params(Strictness::Balanced)).unwrap();
        assert!(set.long_entry[0]);
    }

    #[test]
    fn mismatched_zone_length_is_an_error() {
        let mut frame = frame_with_rsi(&[25.0, 25.0]);
        frame.set_zones(ZoneFlags {
            near_support: vec![true],
            near_resistance: vec![true, true],
        });
        assert_eq!(
            generate(&frame, &params(Strictness::Balanced)),
            Err(SignalError::ZoneLength { expected: 2, got: 1 })
        );
    }

    #[test]
    fn escalation_stops_at_first_sufficient_level() {
        // 33: Relaxed entry; 38: UltraRelaxed entry
        let frame = frame_with_rsi(&[33.0, 50.0, 38.0, 50.0]);
        let base = params(Strictness::Strict);
        let set = generate_with_escalation(&frame, &base, 1).unwrap();
        assert_eq!(set.strictness, Strictness::Relaxed);
        assert_eq!(set.entry_count(), 1);
    }

    #[test]
    fn escalation_ends_at_ultra_relaxed() {
        let frame = frame_with_rsi(&[50.0; 3]);
        let set = generate_with_escalation(&frame, &params(Strictness::Strict), 5).unwrap();
        assert_eq!(set.strictness, Strictness::UltraRelaxed);
        // close sits under the middle band on all three bars
        assert_eq!(set.entry_count(), 3);
    }

    #[test]
    fn escalation_with_zero_minimum_keeps_requested_level() {
        let frame = frame_with_rsi(&[50.0; 3]);
        let set = generate_with_escalation(&frame, &params(Strictness::Balanced), 0).unwrap();
        assert_eq!(set.strictness, Strictness::Balanced);
    }

    #[test]
    fn escalation_counts_only_masked_entries() {
        let frame = frame_with_rsi(&[25.0, 33.0]);
        let set = escalate(&frame, &params(Strictness::Balanced), 1, Some(&[false, true])).unwrap();
        assert_eq!(set.strictness, Strictness::Relaxed);
        assert_eq!(set.long_entry, vec![false, true]);
    }
}

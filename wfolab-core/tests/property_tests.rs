//! Property tests for core invariants.
//!
//! Uses proptest to verify:
//! 1. Regime summaries sum to 100% over any non-empty label sequence
//! 2. Entry/exit exclusivity holds for arbitrary parameters and levels
//! 3. Grid expansion yields exactly the cross-product size, all distinct
//! 4. Regime adaptation keeps parameters inside their clamps

use proptest::prelude::*;
use wfolab_core::features::FeatureFrame;
use wfolab_core::params::{ParamGrid, ParamValue, ParameterSet, StrategyParams};
use wfolab_core::regime::{summarize, RegimeLabel};
use wfolab_core::signal::{adapt, generate, Strictness};
use wfolab_core::synthetic::random_walk_series;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_label() -> impl Strategy<Value = RegimeLabel> {
    prop::sample::select(RegimeLabel::ALL.to_vec())
}

fn arb_strictness() -> impl Strategy<Value = Strictness> {
    prop::sample::select(Strictness::LADDER.to_vec())
}

fn arb_params() -> impl Strategy<Value = StrategyParams> {
    (
        5usize..30,
        15.0..40.0_f64,
        60.0..85.0_f64,
        1.0..3.0_f64,
        any::<bool>(),
        0usize..5,
        arb_strictness(),
    )
        .prop_map(|(rsi_period, lower, upper, bb_std, trend, hold, level)| StrategyParams {
            rsi_period,
            rsi_lower_threshold: lower,
            rsi_upper_threshold: upper,
            bb_std,
            use_trend_filter: trend,
            min_hold_period: hold,
            strictness: level,
            ..StrategyParams::default()
        })
}

// ── 1. Summaries ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn summary_percentages_sum_to_100(labels in prop::collection::vec(arb_label(), 1..300)) {
        let summary = summarize(&labels);
        let total: f64 = summary.values().sum();
        prop_assert!((total - 100.0).abs() < 1e-6, "total = {}", total);
        prop_assert!(summary.values().all(|p| *p > 0.0));
    }
}

// ── 2. Exclusivity ───────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn entry_and_exit_never_share_a_bar(params in arb_params(), seed in 0u64..1_000) {
        let series = random_walk_series(250, seed, 100.0, 0.02);
        let frame = FeatureFrame::compute(&series, &params.feature_spec());
        let set = generate(&frame, &params).unwrap();
        prop_assert_eq!(set.len(), 250);
        for i in 0..set.len() {
            prop_assert!(!(set.long_entry[i] && set.long_exit[i]));
            prop_assert!(!(set.short_entry[i] && set.short_exit[i]));
        }
    }
}

// ── 3. Grids ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn grid_expansion_matches_size(a in 1usize..6, b in 1usize..6, c in 1usize..6) {
        let axis = |n: usize| (0..n as i64).map(ParamValue::Int).collect::<Vec<_>>();
        let grid = ParamGrid::new()
            .axis("x", axis(a))
            .axis("y", axis(b))
            .axis("z", axis(c));
        let sets = grid.expand(&ParameterSet::new(), 512).unwrap();
        prop_assert_eq!(sets.len(), a * b * c);
        prop_assert_eq!(grid.size(), a * b * c);
        let mut prints: Vec<_> = sets.iter().map(ParameterSet::fingerprint).collect();
        prints.sort();
        prints.dedup();
        prop_assert_eq!(prints.len(), a * b * c);
    }
}

// ── 4. Adaptation clamps ─────────────────────────────────────────────

proptest! {
    #[test]
    fn adapted_params_stay_in_bounds(params in arb_params(), label in arb_label()) {
        let base = StrategyParams { use_regime_filter: true, ..params };
        let adapted = adapt(&base, Some(label));
        prop_assert!(adapted.rsi_lower_threshold < adapted.rsi_upper_threshold);
        prop_assert!((0.0..=1.0).contains(&adapted.zone_influence));
        prop_assert!(adapted.min_hold_period >= base.min_hold_period);
        if adapted.rsi_lower_threshold != base.rsi_lower_threshold {
            prop_assert!((25.0..=75.0).contains(&adapted.rsi_lower_threshold));
        }
        if adapted.bb_std != base.bb_std {
            prop_assert!((1.0..=3.5).contains(&adapted.bb_std));
        }
    }
}

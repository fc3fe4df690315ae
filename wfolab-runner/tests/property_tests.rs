//! Property tests for the window splitter and robustness ratio.
//!
//! Uses proptest to verify:
//! 1. Split count matches the closed form for any valid plan
//! 2. Every split is contiguous, in bounds, and advances by the step
//! 3. The robustness ratio keeps the sign of the test score for positive train scores

use proptest::prelude::*;
use wfolab_runner::orchestrator::robustness_ratio;
use wfolab_runner::splitter::{splits, splits_overlap};

// ── 1. Counts ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn split_count_matches_closed_form(
        train in 1usize..200,
        test in 1usize..100,
        step in 1usize..100,
        extra in 0usize..500,
    ) {
        let total = train + test + extra;
        let plan = splits(total, train, test, step, None).unwrap();
        prop_assert_eq!(plan.len(), extra / step + 1);
    }

    #[test]
    fn max_splits_is_an_upper_bound(
        extra in 0usize..500,
        cap in 0usize..10,
    ) {
        let plan = splits(150 + extra, 100, 50, 10, Some(cap)).unwrap();
        prop_assert!(plan.len() <= cap);
    }
}

// ── 2. Shape ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn splits_are_contiguous_and_in_bounds(
        train in 1usize..200,
        test in 1usize..100,
        step in 1usize..100,
        extra in 0usize..500,
    ) {
        let total = train + test + extra;
        let plan = splits(total, train, test, step, None).unwrap();
        for (k, s) in plan.iter().enumerate() {
            prop_assert_eq!(s.index, k);
            prop_assert_eq!(s.train_start, k * step);
            prop_assert_eq!(s.train_end - s.train_start, train);
            prop_assert_eq!(s.test_start, s.train_end);
            prop_assert_eq!(s.test_end - s.test_start, test);
            prop_assert!(s.test_end <= total);
        }
        if plan.len() > 1 {
            prop_assert_eq!(splits_overlap(&plan), step < test);
        }
    }
}

// ── 3. Robustness ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn positive_train_keeps_test_sign(train in 0.01f64..10.0, test in -10.0f64..10.0) {
        let ratio = robustness_ratio(train, test).unwrap();
        prop_assert_eq!(ratio > 0.0, test > 0.0);
        prop_assert!((ratio * train - test).abs() < 1e-9);
    }
}

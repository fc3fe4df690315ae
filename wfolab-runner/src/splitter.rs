//! Window splitter — rolling train/test index ranges.
//!
//! Train window `k` starts at `k * step_size` and spans `train_size` bars; the
//! test window is the `test_size` bars immediately after it (zero gap).
//! Splits are emitted while the test window fits inside the series.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One contiguous train/test pair. Ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub index: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

impl Split {
    pub fn train_range(&self) -> std::ops::Range<usize> {
        self.train_start..self.train_end
    }

    pub fn test_range(&self) -> std::ops::Range<usize> {
        self.test_start..self.test_end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("insufficient data: need {required} bars for one train+test window, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("{0} must be greater than zero")]
    ZeroSize(&'static str),
}

/// Generate rolling splits over `total_length` bars.
///
/// `max_splits = None` is unbounded.
pub fn splits(
    total_length: usize,
    train_size: usize,
    test_size: usize,
    step_size: usize,
    max_splits: Option<usize>,
) -> Result<Vec<Split>, SplitError> {
    for (name, value) in [
        ("train_size", train_size),
        ("test_size", test_size),
        ("step_size", step_size),
    ] {
        if value == 0 {
            return Err(SplitError::ZeroSize(name));
        }
    }
    let required = train_size + test_size;
    if required > total_length {
        return Err(SplitError::InsufficientData {
            required,
            available: total_length,
        });
    }

    let limit = max_splits.unwrap_or(usize::MAX);
    let mut out = Vec::new();
    let mut k = 0;
    while out.len() < limit {
        let train_start = k * step_size;
        let train_end = train_start + train_size;
        let test_end = train_end + test_size;
        if test_end > total_length {
            break;
        }
        out.push(Split {
            index: k,
            train_start,
            train_end,
            test_start: train_end,
            test_end,
        });
        k += 1;
    }
    Ok(out)
}

/// True when consecutive test windows share bars (`step < test`).
pub fn splits_overlap(splits: &[Split]) -> bool {
    splits
        .windows(2)
        .any(|pair| pair[1].test_start < pair[0].test_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_split_when_step_equals_test() {
        let s = splits(240, 144, 72, 72, None).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(
            s[0],
            Split {
                index: 0,
                train_start: 0,
                train_end: 144,
                test_start: 144,
                test_end: 216,
            }
        );
    }

    #[test]
    fn smaller_step_yields_overlapping_splits() {
        let s = splits(240, 144, 72, 24, None).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].train_start, 0);
        assert_eq!(s[1].train_start, 24);
        assert_eq!(s[1].test_end, 240);
        assert!(splits_overlap(&s));
    }

    #[test]
    fn non_overlapping_when_step_equals_test() {
        let s = splits(1000, 200, 100, 100, None).unwrap();
        assert_eq!(s.len(), 8);
        assert!(!splits_overlap(&s));
        for pair in s.windows(2) {
            assert_eq!(pair[1].test_start, pair[0].test_end);
        }
    }

    #[test]
    fn exact_fit_is_one_split() {
        assert_eq!(splits(100, 60, 40, 10, None).unwrap().len(), 1);
    }

    #[test]
    fn insufficient_data_is_rejected() {
        assert_eq!(
            splits(100, 80, 30, 10, None),
            Err(SplitError::InsufficientData {
                required: 110,
                available: 100
            })
        );
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert_eq!(splits(100, 0, 10, 10, None), Err(SplitError::ZeroSize("train_size")));
        assert_eq!(splits(100, 10, 0, 10, None), Err(SplitError::ZeroSize("test_size")));
        assert_eq!(splits(100, 10, 10, 0, None), Err(SplitError::ZeroSize("step_size")));
    }

    #[test]
    fn max_splits_caps_output() {
        assert_eq!(splits(1000, 100, 50, 10, Some(3)).unwrap().len(), 3);
        assert!(splits(1000, 100, 50, 10, Some(0)).unwrap().is_empty());
    }
}

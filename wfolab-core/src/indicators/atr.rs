//! Average True Range and the Wilder smoother shared with ADX.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut tr = true_range(bars);
        // The first bar has no previous close, so its range is not a true range.
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        wilder_smooth(&tr, self.period)
    }
}

/// True range per bar: `max(h-l, |h-prev_c|, |l-prev_c|)`; bar 0 is `h-l`.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut prev_close: Option<f64> = None;
    bars.iter()
        .map(|bar| {
            let range = bar.high - bar.low;
            let tr = match prev_close {
                Some(pc) => range.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
                None => range,
            };
            prev_close = Some(bar.close);
            if tr.is_finite() {
                tr
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Wilder smoothing (alpha = 1/period).
///
/// Seeds with the mean of the first run of `period` consecutive finite values;
/// a non-finite value after the seed makes the remainder `NAN`.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }

    let mut run = 0;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_finite() {
            run += 1;
            if run == period {
                seed_end = Some(i);
                break;
            }
        } else {
            run = 0;
        }
    }
    let Some(seed_end) = seed_end else {
        return out;
    };

    let p = period as f64;
    let mut prev = values[seed_end + 1 - period..=seed_end].iter().sum::<f64>() / p;
    out[seed_end] = prev;
    for i in (seed_end + 1)..n {
        if !values[i].is_finite() {
            break;
        }
        prev = (prev * (p - 1.0) + values[i]) / p;
        out[i] = prev;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_uses_previous_close() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // 10
            (102.0, 108.0, 100.0, 106.0), // max(8, 6, 2) = 8
            (106.0, 107.0, 98.0, 99.0),   // max(9, 1, 8) = 9
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[(98.0, 102.0, 97.0, 100.0), (110.0, 115.0, 108.0, 112.0)]);
        assert_approx(true_range(&bars)[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0), // 8
            (106.0, 107.0, 98.0, 99.0),   // 9
            (99.0, 103.0, 97.0, 101.0),   // 6
            (101.0, 106.0, 100.0, 105.0), // 6
        ]);
        let result = Atr::new(3).compute(&bars);
        assert!(result[..3].iter().all(|v| v.is_nan()));
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 64.0 / 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_skips_leading_nan() {
        let out = wilder_smooth(&[f64::NAN, 2.0, 4.0, 6.0], 2);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_approx(out[2], 3.0, DEFAULT_EPSILON);
        assert_approx(out[3], 4.5, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_too_short() {
        assert!(wilder_smooth(&[1.0], 3).iter().all(|v| v.is_nan()));
    }
}

//! Relative Strength Index (Wilder).
//!
//! Seeded with the simple mean of the first `period` gains/losses, then
//! smoothed with alpha = 1/period. A non-finite close resets nothing: every
//! value from that bar on is `NAN`.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rsi_from_closes(&closes, self.period)
    }
}

/// RSI over a raw close series.
pub fn rsi_from_closes(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if !change.is_finite() {
            return out;
        }
        avg_gain += change.max(0.0);
        avg_loss += (-change).max(0.0);
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    let p = period as f64;
    for i in (period + 1)..n {
        let change = closes[i] - closes[i - 1];
        if !change.is_finite() {
            break;
        }
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    match (avg_gain == 0.0, avg_loss == 0.0) {
        (true, true) => 50.0,
        (_, true) => 100.0,
        (true, _) => 0.0,
        _ => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn rsi_all_gains_is_100() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let result = Rsi::new(3).compute(&bars);
        assert_approx(result[3], 100.0, 1e-9);
        assert_approx(result[5], 100.0, 1e-9);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let bars = make_bars(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let result = Rsi::new(3).compute(&bars);
        assert_approx(result[3], 0.0, 1e-9);
    }

    #[test]
    fn rsi_flat_is_50() {
        let result = rsi_from_closes(&[100.0; 6], 3);
        assert_approx(result[4], 50.0, 1e-9);
    }

    #[test]
    fn rsi_seed_value() {
        // changes: +0.34, -0.25, -0.48 → gain 0.34/3, loss 0.73/3
        let result = rsi_from_closes(&[44.0, 44.34, 44.09, 43.61], 3);
        let expected = 100.0 - 100.0 / (1.0 + 0.34 / 0.73);
        assert!(result[..3].iter().all(|v| v.is_nan()));
        assert_approx(result[3], expected, 1e-9);
    }

    #[test]
    fn rsi_stays_in_bounds() {
        let bars = make_bars(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        for v in Rsi::new(3).compute(&bars).into_iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(&v), "RSI out of bounds: {v}");
        }
    }

    #[test]
    fn rsi_nan_in_seed_window_yields_all_nan() {
        let result = rsi_from_closes(&[100.0, 101.0, f64::NAN, 103.0, 104.0], 3);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_too_few_bars() {
        let result = rsi_from_closes(&[100.0, 101.0, 102.0], 3);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_truncation_does_not_change_history() {
        let closes = [100.0, 102.0, 101.0, 104.0, 103.0, 99.0, 98.0, 101.0, 105.0];
        let full = rsi_from_closes(&closes, 3);
        let truncated = rsi_from_closes(&closes[..6], 3);
        for i in 3..6 {
            assert_approx(full[i], truncated[i], 1e-12);
        }
    }
}

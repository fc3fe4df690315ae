//! Rate of Change: percent change of close over `period` bars.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    name: String,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ROC period must be >= 1");
        Self {
            period,
            name: format!("roc_{period}"),
        }
    }
}

impl Indicator for Roc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut out = vec![f64::NAN; bars.len()];
        for (i, pair) in bars.windows(self.period + 1).enumerate() {
            let prev = pair[0].close;
            let curr = pair[self.period].close;
            if prev.is_finite() && curr.is_finite() && prev != 0.0 {
                out[i + self.period] = (curr - prev) / prev * 100.0;
            }
        }
        out
    }
}

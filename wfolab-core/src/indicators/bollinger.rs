//! Bollinger Bands — SMA(close) ± multiplier × population stddev.
//!
//! All three bands come out of one rolling pass. Lookback: period - 1.

use crate::domain::Bar;

/// Aligned upper/middle/lower bands.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(bars: &[Bar], period: usize, multiplier: f64) -> BollingerBands {
    let n = bars.len();
    let mut bands = BollingerBands {
        upper: vec![f64::NAN; n],
        middle: vec![f64::NAN; n],
        lower: vec![f64::NAN; n],
    };
    if period == 0 || n < period {
        return bands;
    }

    for end in period..=n {
        let window = &bars[end - period..end];
        if window.iter().any(|b| !b.close.is_finite()) {
            continue;
        }
        let mean = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|b| (b.close - mean).powi(2))
            .sum::<f64>()
            / period as f64;
        let width = multiplier * variance.sqrt();
        let i = end - 1;
        bands.middle[i] = mean;
        bands.upper[i] = mean + width;
        bands.lower[i] = mean - width;
    }
    bands
}

//! Feature producers.
//!
//! Single-series indicators (RSI, ATR, ROC) implement `Indicator`.
//! Multi-output producers (Bollinger bands, directional index) return a
//! struct of aligned series in one pass. Every output has the same length as
//! the input bars and is `f64::NAN` during warm-up.
//!
//! No value at bar t may depend on bars after t.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod roc;
pub mod rsi;

pub use adx::{directional_index, DirectionalIndex};
pub use atr::{true_range, wilder_smooth, Atr};
pub use bollinger::{bollinger_bands, BollingerBands};
pub use roc::Roc;
pub use rsi::Rsi;

use crate::domain::Bar;

/// Trait for single-series indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "atr_14").
    fn name(&self) -> &str;

    /// Number of leading bars that are `NAN`.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Synthetic bars from close prices for indicator tests.
///
/// open = previous close, high/low = max/min(open, close) ± 1.0, hourly spacing.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: base + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

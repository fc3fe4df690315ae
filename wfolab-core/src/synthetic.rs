//! Deterministic synthetic price series for tests, benches and demo runs.
//!
//! Bars are hourly from 2024-01-01T00:00Z. Each bar opens at the previous
//! close and its high/low extend `spread` beyond the open/close body.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, TimeSeries};

const DEFAULT_SPREAD: f64 = 0.5;

/// 2024-01-01T00:00:00Z
fn origin() -> DateTime<Utc> {
    Utc.timestamp_nanos(1_704_067_200_000_000_000)
}

/// Build bars from closes. Closes must be finite and stay above `spread`.
pub fn bars_from_closes(closes: &[f64], spread: f64) -> Vec<Bar> {
    let start = origin();
    let mut prev = closes.first().copied().unwrap_or(0.0);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev;
            prev = close;
            Bar {
                timestamp: start + Duration::hours(i as i64),
                open,
                high: open.max(close) + spread,
                low: open.min(close) - spread,
                close,
                volume: 1_000.0,
            }
        })
        .collect()
}

fn series_from_closes(closes: &[f64]) -> TimeSeries {
    TimeSeries::from_generated(bars_from_closes(closes, DEFAULT_SPREAD))
}

/// Linear trend: `start + i * step`.
pub fn trend_series(n: usize, start: f64, step: f64) -> TimeSeries {
    let closes: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
    series_from_closes(&closes)
}

/// Triangle wave: legs of `leg_len` bars moving `step` per bar, starting up.
pub fn zigzag_series(n: usize, start: f64, leg_len: usize, step: f64) -> TimeSeries {
    let leg_len = leg_len.max(1);
    let mut close = start;
    let mut closes = Vec::with_capacity(n);
    for i in 0..n {
        if i > 0 {
            let rising = ((i - 1) / leg_len) % 2 == 0;
            close += if rising { step } else { -step };
        }
        closes.push(close);
    }
    series_from_closes(&closes)
}

/// Sine wave of the given period (in bars) around `center`.
pub fn sine_series(n: usize, period: f64, amplitude: f64, center: f64) -> TimeSeries {
    let closes: Vec<f64> = (0..n)
        .map(|i| center + amplitude * (2.0 * std::f64::consts::PI * i as f64 / period).sin())
        .collect();
    series_from_closes(&closes)
}

/// Seeded series alternating trending and ranging stretches of `segment`
/// bars, with multiplicative noise. Same seed, same series.
pub fn regime_switching_series(n: usize, seed: u64, segment: usize) -> TimeSeries {
    let segment = segment.max(1);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut close: f64 = 100.0;
    let mut closes = Vec::with_capacity(n);
    for i in 0..n {
        let block = i / segment;
        let phase = (i % segment) as f64 / segment as f64;
        let drift = match block % 4 {
            0 => 0.004,
            2 => -0.004,
            _ => 0.012 * (2.0 * std::f64::consts::PI * phase * 3.0).cos(),
        };
        let noise: f64 = rng.gen_range(-0.006..0.006);
        close = (close * (1.0 + drift + noise)).max(1.0);
        closes.push(close);
    }
    TimeSeries::from_generated(bars_from_closes(&closes, close_spread(&closes)))
}

/// Spread small enough to keep every low positive.
fn close_spread(closes: &[f64]) -> f64 {
    let min = closes.iter().copied().fold(f64::INFINITY, f64::min);
    if min.is_finite() {
        (min * 0.002).min(DEFAULT_SPREAD)
    } else {
        DEFAULT_SPREAD
    }
}

/// Seeded geometric random walk with per-bar volatility `vol`.
pub fn random_walk_series(n: usize, seed: u64, start: f64, vol: f64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut close = start;
    let closes: Vec<f64> = (0..n)
        .map(|_| {
            let shock: f64 = rng.gen_range(-vol..=vol);
            close = (close * (1.0 + shock)).max(1.0);
            close
        })
        .collect();
    TimeSeries::from_generated(bars_from_closes(&closes, close_spread(&closes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_series_are_valid() {
        let all = [
            trend_series(50, 100.0, 1.0),
            zigzag_series(200, 100.0, 20, 1.0),
            sine_series(100, 25.0, 10.0, 100.0),
            regime_switching_series(500, 7, 60),
            random_walk_series(300, 42, 100.0, 0.02),
        ];
        for series in all {
            assert!(TimeSeries::new(series.bars().to_vec()).is_ok());
        }
    }

    #[test]
    fn zigzag_turns_every_leg() {
        let closes = zigzag_series(9, 100.0, 2, 1.0).closes();
        assert_eq!(closes, vec![100.0, 101.0, 102.0, 101.0, 100.0, 101.0, 102.0, 101.0, 100.0]);
    }

    #[test]
    fn seeded_series_are_reproducible() {
        assert_eq!(regime_switching_series(120, 3, 30), regime_switching_series(120, 3, 30));
        assert_ne!(random_walk_series(120, 1, 100.0, 0.02), random_walk_series(120, 2, 100.0, 0.02));
    }
}

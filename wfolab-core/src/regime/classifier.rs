//! Per-bar regime classification from trend strength, direction, volatility
//! and momentum features.

use serde::{Deserialize, Serialize};

use super::RegimeLabel;
use crate::domain::TimeSeries;
use crate::features::{Feature, FeatureFrame, FeatureSpec};

/// Basic mode only separates trending from ranging; advanced mode also
/// detects breakouts, breakdowns and volatile ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeMode {
    Basic,
    #[default]
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    /// ADX at or above this marks a trend.
    pub adx_trend: f64,
    /// ATR% over its window mean at or above this marks expanded volatility.
    pub volatility_expansion: f64,
    /// Absolute ROC (percent) at or above this, with expanded volatility,
    /// marks a breakout or breakdown.
    pub momentum_breakout: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            adx_trend: 25.0,
            volatility_expansion: 1.5,
            momentum_breakout: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeClassifier {
    pub thresholds: RegimeThresholds,
    pub mode: RegimeMode,
    /// Lookbacks for the classifier's own features.
    pub features: FeatureSpec,
}

impl RegimeClassifier {
    pub fn new(thresholds: RegimeThresholds, mode: RegimeMode) -> Self {
        Self {
            thresholds,
            mode,
            features: FeatureSpec::default(),
        }
    }

    /// Compute the classifier's features for `series` and classify every bar.
    pub fn classify_series(&self, series: &TimeSeries) -> Vec<RegimeLabel> {
        self.classify(&FeatureFrame::compute(series, &self.features))
    }

    /// One label per bar of `frame`. Bars whose features are not yet
    /// available (warm-up, missing columns) are `Unknown`.
    pub fn classify(&self, frame: &FeatureFrame) -> Vec<RegimeLabel> {
        let n = frame.len();
        let column = |f: Feature| frame.column(f);
        let (Some(adx), Some(plus_di), Some(minus_di)) = (
            column(Feature::Adx),
            column(Feature::PlusDi),
            column(Feature::MinusDi),
        ) else {
            return vec![RegimeLabel::Unknown; n];
        };

        let vol_ratio = column(Feature::AtrPct).map(relative_to_mean);
        let momentum = column(Feature::Momentum);

        (0..n)
            .map(|i| {
                let adx = adx[i];
                if adx.is_nan() {
                    return RegimeLabel::Unknown;
                }
                let trending = adx >= self.thresholds.adx_trend;
                let direction = if minus_di[i] > plus_di[i] {
                    RegimeLabel::TrendingDown
                } else {
                    RegimeLabel::TrendingUp
                };

                if self.mode == RegimeMode::Basic {
                    return if trending { direction } else { RegimeLabel::Ranging };
                }

                let expanded = vol_ratio
                    .as_ref()
                    .is_some_and(|r| r[i] >= self.thresholds.volatility_expansion);
                let roc = momentum.map_or(f64::NAN, |m| m[i]);
                if expanded && roc >= self.thresholds.momentum_breakout {
                    RegimeLabel::Breakout
                } else if expanded && roc <= -self.thresholds.momentum_breakout {
                    RegimeLabel::Breakdown
                } else if trending {
                    direction
                } else if expanded {
                    RegimeLabel::VolatileRange
                } else {
                    RegimeLabel::Ranging
                }
            })
            .collect()
    }
}

/// Each value divided by the mean of the finite values; `NAN` where undefined.
fn relative_to_mean(values: &[f64]) -> Vec<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 || sum <= 0.0 {
        return vec![f64::NAN; values.len()];
    }
    let mean = sum / count as f64;
    values.iter().map(|v| v / mean).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::{predominant, summarize, SimpleRegime};
    use crate::synthetic::{trend_series, zigzag_series};

    #[test]
    fn strong_uptrend_is_trending_up() {
        let series = trend_series(120, 100.0, 1.0);
        let labels = RegimeClassifier::new(RegimeThresholds::default(), RegimeMode::Basic)
            .classify_series(&series);
        assert_eq!(labels.len(), 120);
        assert_eq!(labels[119], RegimeLabel::TrendingUp);
        assert!(labels[..10].iter().all(|l| *l == RegimeLabel::Unknown));
    }

    #[test]
    fn strong_downtrend_is_trending_down() {
        let series = trend_series(120, 300.0, -1.0);
        let labels = RegimeClassifier::default().classify_series(&series);
        assert_eq!(labels[119], RegimeLabel::TrendingDown);
    }

    #[test]
    fn tight_zigzag_is_mostly_ranging() {
        let series = zigzag_series(200, 100.0, 2, 0.5);
        let labels = RegimeClassifier::new(RegimeThresholds::default(), RegimeMode::Basic)
            .classify_series(&series);
        let summary = summarize(&labels);
        assert_eq!(predominant(&summary, 50.0), SimpleRegime::Ranging);
    }

    #[test]
    fn missing_features_give_unknown() {
        let frame = FeatureFrame::with_len(5);
        let labels = RegimeClassifier::default().classify(&frame);
        assert_eq!(labels, vec![RegimeLabel::Unknown; 5]);
    }

    #[test]
    fn advanced_mode_flags_breakout() {
        let mut frame = FeatureFrame::with_len(3);
        frame.insert(Feature::Adx, vec![10.0, 10.0, 40.0]);
        frame.insert(Feature::PlusDi, vec![20.0, 20.0, 30.0]);
        frame.insert(Feature::MinusDi, vec![10.0, 10.0, 10.0]);
        // mean 0.02: ratios 0.5, 0.5, 2.0
        frame.insert(Feature::AtrPct, vec![0.01, 0.01, 0.04]);
        frame.insert(Feature::Momentum, vec![0.0, 0.0, 8.0]);
        let labels = RegimeClassifier::default().classify(&frame);
        assert_eq!(
            labels,
            vec![RegimeLabel::Ranging, RegimeLabel::Ranging, RegimeLabel::Breakout]
        );
    }

    #[test]
    fn advanced_mode_flags_breakdown_and_volatile_range() {
        let mut frame = FeatureFrame::with_len(4);
        frame.insert(Feature::Adx, vec![10.0, 10.0, 10.0, 10.0]);
        frame.insert(Feature::PlusDi, vec![20.0; 4]);
        frame.insert(Feature::MinusDi, vec![20.0; 4]);
        // mean 0.02: ratios 0.5, 0.5, 1.5, 1.5
        frame.insert(Feature::AtrPct, vec![0.01, 0.01, 0.03, 0.03]);
        frame.insert(Feature::Momentum, vec![0.0, 0.0, -9.0, 1.0]);
        let labels = RegimeClassifier::default().classify(&frame);
        assert_eq!(labels[2], RegimeLabel::Breakdown);
        assert_eq!(labels[3], RegimeLabel::VolatileRange);
    }

    #[test]
    fn basic_mode_ignores_volatility() {
        let mut frame = FeatureFrame::with_len(2);
        frame.insert(Feature::Adx, vec![10.0, 40.0]);
        frame.insert(Feature::PlusDi, vec![10.0, 10.0]);
        frame.insert(Feature::MinusDi, vec![20.0, 20.0]);
        frame.insert(Feature::AtrPct, vec![0.01, 0.09]);
        frame.insert(Feature::Momentum, vec![0.0, -20.0]);
        let classifier = RegimeClassifier::new(RegimeThresholds::default(), RegimeMode::Basic);
        assert_eq!(
            classifier.classify(&frame),
            vec![RegimeLabel::Ranging, RegimeLabel::TrendingDown]
        );
    }
}

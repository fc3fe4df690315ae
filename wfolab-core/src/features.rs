//! FeatureFrame — precomputed feature columns aligned to a TimeSeries.
//!
//! Features are computed once per (window, feature spec) and then only read.
//! Signal generation and regime classification query columns by the closed
//! `Feature` key, never by string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{TimeSeries, ZoneFlags};
use crate::indicators::{bollinger_bands, directional_index, Atr, Indicator, Roc, Rsi};

/// Every column a FeatureFrame can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Close,
    Rsi,
    BbUpper,
    BbMiddle,
    BbLower,
    Adx,
    PlusDi,
    MinusDi,
    Atr,
    /// ATR as a fraction of close.
    AtrPct,
    /// Rate of change in percent.
    Momentum,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Rsi => "rsi",
            Self::BbUpper => "bb_upper",
            Self::BbMiddle => "bb_middle",
            Self::BbLower => "bb_lower",
            Self::Adx => "adx",
            Self::PlusDi => "plus_di",
            Self::MinusDi => "minus_di",
            Self::Atr => "atr",
            Self::AtrPct => "atr_pct",
            Self::Momentum => "momentum",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookback lengths for the feature producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSpec {
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_std: f64,
    pub adx_period: usize,
    pub atr_period: usize,
    pub momentum_period: usize,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            bb_period: 20,
            bb_std: 2.0,
            adx_period: 14,
            atr_period: 14,
            momentum_period: 10,
        }
    }
}

impl FeatureSpec {
    /// Bars needed before every column has produced a value.
    pub fn warmup(&self) -> usize {
        [
            self.rsi_period,
            self.bb_period.saturating_sub(1),
            2 * self.adx_period,
            self.atr_period,
            self.momentum_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Named, bar-aligned feature columns plus optional zone flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    len: usize,
    columns: BTreeMap<Feature, Vec<f64>>,
    zones: Option<ZoneFlags>,
}

impl FeatureFrame {
    /// Empty frame of `len` bars; columns are added with `insert`.
    pub fn with_len(len: usize) -> Self {
        Self {
            len,
            ..Self::default()
        }
    }

    /// Compute every feature column for `series`.
    ///
    /// Periods of zero are not computed; the affected columns are absent and
    /// `require` reports them.
    pub fn compute(series: &TimeSeries, spec: &FeatureSpec) -> Self {
        let bars = series.bars();
        let mut frame = Self::with_len(bars.len());
        frame.insert(Feature::Close, series.closes());

        if spec.rsi_period > 0 {
            frame.insert(Feature::Rsi, Rsi::new(spec.rsi_period).compute(bars));
        }
        if spec.bb_period > 0 {
            let bands = bollinger_bands(bars, spec.bb_period, spec.bb_std);
            frame.insert(Feature::BbUpper, bands.upper);
            frame.insert(Feature::BbMiddle, bands.middle);
            frame.insert(Feature::BbLower, bands.lower);
        }
        if spec.adx_period > 0 {
            let di = directional_index(bars, spec.adx_period);
            frame.insert(Feature::Adx, di.adx);
            frame.insert(Feature::PlusDi, di.plus_di);
            frame.insert(Feature::MinusDi, di.minus_di);
        }
        if spec.atr_period > 0 {
            let atr = Atr::new(spec.atr_period).compute(bars);
            let atr_pct = atr
                .iter()
                .zip(bars)
                .map(|(a, b)| if b.close > 0.0 { a / b.close } else { f64::NAN })
                .collect();
            frame.insert(Feature::Atr, atr);
            frame.insert(Feature::AtrPct, atr_pct);
        }
        if spec.momentum_period > 0 {
            frame.insert(
                Feature::Momentum,
                Roc::new(spec.momentum_period).compute(bars),
            );
        }
        frame.zones = series.zones().cloned();
        frame
    }

    /// Insert or replace a column. Columns shorter or longer than the frame
    /// are padded with `NAN` or truncated.
    pub fn insert(&mut self, feature: Feature, mut values: Vec<f64>) {
        values.resize(self.len, f64::NAN);
        self.columns.insert(feature, values);
    }

    pub fn set_zones(&mut self, zones: ZoneFlags) {
        self.zones = Some(zones);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value of `feature` at bar `index`, if the column exists.
    pub fn get(&self, feature: Feature, index: usize) -> Option<f64> {
        self.columns
            .get(&feature)
            .and_then(|col| col.get(index).copied())
    }

    pub fn column(&self, feature: Feature) -> Option<&[f64]> {
        self.columns.get(&feature).map(Vec::as_slice)
    }

    pub fn zones(&self) -> Option<&ZoneFlags> {
        self.zones.as_ref()
    }

    /// First feature among `required` that is absent or has no finite value.
    pub fn require(&self, required: &[Feature]) -> Result<(), Feature> {
        for &feature in required {
            let usable = self
                .columns
                .get(&feature)
                .is_some_and(|col| col.iter().any(|v| v.is_finite()));
            if !usable {
                return Err(feature);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::sine_series;

    #[test]
    fn compute_fills_every_column() {
        let series = sine_series(120, 30.0, 10.0, 100.0);
        let frame = FeatureFrame::compute(&series, &FeatureSpec::default());
        assert_eq!(frame.len(), 120);
        let all = [
            Feature::Close,
            Feature::Rsi,
            Feature::BbUpper,
            Feature::BbMiddle,
            Feature::BbLower,
            Feature::Adx,
            Feature::PlusDi,
            Feature::MinusDi,
            Feature::Atr,
            Feature::AtrPct,
            Feature::Momentum,
        ];
        assert_eq!(frame.require(&all), Ok(()));
        for f in all {
            assert_eq!(frame.column(f).map(<[f64]>::len), Some(120));
        }
    }

    #[test]
    fn short_series_reports_empty_feature() {
        let series = sine_series(10, 30.0, 10.0, 100.0);
        let frame = FeatureFrame::compute(&series, &FeatureSpec::default());
        // ADX needs 2 * 14 bars
        assert_eq!(frame.require(&[Feature::Close, Feature::Adx]), Err(Feature::Adx));
    }

    #[test]
    fn zero_period_leaves_column_absent() {
        let series = sine_series(60, 30.0, 10.0, 100.0);
        let spec = FeatureSpec {
            momentum_period: 0,
            ..FeatureSpec::default()
        };
        let frame = FeatureFrame::compute(&series, &spec);
        assert!(frame.column(Feature::Momentum).is_none());
        assert_eq!(frame.require(&[Feature::Momentum]), Err(Feature::Momentum));
    }

    #[test]
    fn insert_pads_to_frame_length() {
        let mut frame = FeatureFrame::with_len(4);
        frame.insert(Feature::Rsi, vec![10.0, 20.0]);
        assert_eq!(frame.get(Feature::Rsi, 1), Some(20.0));
        assert!(frame.get(Feature::Rsi, 3).unwrap().is_nan());
        assert_eq!(frame.get(Feature::Rsi, 4), None);
    }

    #[test]
    fn warmup_is_dominated_by_adx() {
        assert_eq!(FeatureSpec::default().warmup(), 28);
    }
}

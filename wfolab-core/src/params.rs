//! Parameter sets — immutable name→value maps, their typed strategy view, and
//! cross-product grids.
//!
//! `ParameterSet` uses a `BTreeMap` so iteration, serialization and the
//! fingerprint are all independent of insertion order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureSpec;
use crate::signal::Strictness;

// ─── Values ──────────────────────────────────────────────────────────

/// One parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view; booleans and text have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Strictness> for ParamValue {
    fn from(v: Strictness) -> Self {
        Self::Text(v.as_str().to_string())
    }
}

// ─── ParameterSet ────────────────────────────────────────────────────

/// Stable content hash of a ParameterSet (BLAKE3, hex).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamFingerprint(pub String);

impl fmt::Display for ParamFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable name→value mapping. Equality is by value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParamValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of `self` with `name` set to `value`.
    pub fn with(&self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let mut map = self.0.clone();
        map.insert(name.into(), value.into());
        Self(map)
    }

    /// A copy of `self` with every entry of `other` laid on top.
    pub fn merged(&self, other: &ParameterSet) -> Self {
        let mut map = self.0.clone();
        map.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact `name=value` rendering, sorted by name, `;`-separated.
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn fingerprint(&self) -> ParamFingerprint {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in &self.0 {
            hasher.update(name.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(value.kind().as_bytes());
            hasher.update(b":");
            hasher.update(value.to_string().as_bytes());
            hasher.update(b"\x1e");
        }
        ParamFingerprint(hasher.finalize().to_hex().to_string())
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),

    #[error("parameter '{name}' expects {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: String,
    },

    #[error("parameter '{name}' out of range: {reason}")]
    OutOfRange { name: String, reason: String },

    #[error("grid has {size} combinations, limit is {max}")]
    GridTooLarge { size: usize, max: usize },
}

// ─── StrategyParams ──────────────────────────────────────────────────

/// Typed view of a ParameterSet for the RSI/Bollinger/ADX strategy.
///
/// Names absent from the set take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub rsi_period: usize,
    pub rsi_lower_threshold: f64,
    pub rsi_upper_threshold: f64,
    pub bb_period: usize,
    pub bb_std: f64,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub atr_period: usize,
    pub roc_period: usize,
    pub use_trend_filter: bool,
    pub use_regime_filter: bool,
    pub zone_influence: f64,
    pub min_hold_period: usize,
    pub strictness: Strictness,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_lower_threshold: 30.0,
            rsi_upper_threshold: 70.0,
            bb_period: 20,
            bb_std: 2.0,
            adx_period: 14,
            adx_threshold: 25.0,
            atr_period: 14,
            roc_period: 10,
            use_trend_filter: true,
            use_regime_filter: false,
            zone_influence: 0.0,
            min_hold_period: 2,
            strictness: Strictness::Balanced,
        }
    }
}

pub const PARAM_NAMES: &[&str] = &[
    "rsi_period",
    "rsi_lower_threshold",
    "rsi_upper_threshold",
    "bb_period",
    "bb_std",
    "adx_period",
    "adx_threshold",
    "atr_period",
    "roc_period",
    "use_trend_filter",
    "use_regime_filter",
    "zone_influence",
    "min_hold_period",
    "strictness",
];

impl StrategyParams {
    /// Resolve a ParameterSet, applying defaults and validating ranges.
    pub fn from_set(set: &ParameterSet) -> Result<Self, ParamError> {
        if let Some((name, _)) = set.iter().find(|(name, _)| !PARAM_NAMES.contains(name)) {
            return Err(ParamError::Unknown(name.to_string()));
        }
        let d = Self::default();
        let params = Self {
            rsi_period: read_period(set, "rsi_period", d.rsi_period)?,
            rsi_lower_threshold: read_f64(set, "rsi_lower_threshold", d.rsi_lower_threshold)?,
            rsi_upper_threshold: read_f64(set, "rsi_upper_threshold", d.rsi_upper_threshold)?,
            bb_period: read_period(set, "bb_period", d.bb_period)?,
            bb_std: read_f64(set, "bb_std", d.bb_std)?,
            adx_period: read_period(set, "adx_period", d.adx_period)?,
            adx_threshold: read_f64(set, "adx_threshold", d.adx_threshold)?,
            atr_period: read_period(set, "atr_period", d.atr_period)?,
            roc_period: read_period(set, "roc_period", d.roc_period)?,
            use_trend_filter: read_bool(set, "use_trend_filter", d.use_trend_filter)?,
            use_regime_filter: read_bool(set, "use_regime_filter", d.use_regime_filter)?,
            zone_influence: read_f64(set, "zone_influence", d.zone_influence)?,
            min_hold_period: read_usize(set, "min_hold_period", d.min_hold_period)?,
            strictness: read_strictness(set, "strictness", d.strictness)?,
        };
        params.validate()?;
        Ok(params)
    }

    /// Full ParameterSet with every name present.
    pub fn to_set(&self) -> ParameterSet {
        ParameterSet::from_iter([
            ("rsi_period", ParamValue::from(self.rsi_period)),
            ("rsi_lower_threshold", self.rsi_lower_threshold.into()),
            ("rsi_upper_threshold", self.rsi_upper_threshold.into()),
            ("bb_period", self.bb_period.into()),
            ("bb_std", self.bb_std.into()),
            ("adx_period", self.adx_period.into()),
            ("adx_threshold", self.adx_threshold.into()),
            ("atr_period", self.atr_period.into()),
            ("roc_period", self.roc_period.into()),
            ("use_trend_filter", self.use_trend_filter.into()),
            ("use_regime_filter", self.use_regime_filter.into()),
            ("zone_influence", self.zone_influence.into()),
            ("min_hold_period", self.min_hold_period.into()),
            ("strictness", self.strictness.into()),
        ])
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        let out_of_range = |name: &str, reason: String| ParamError::OutOfRange {
            name: name.to_string(),
            reason,
        };
        let lower = self.rsi_lower_threshold;
        let upper = self.rsi_upper_threshold;
        if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) {
            return Err(out_of_range(
                "rsi_lower_threshold",
                format!("RSI thresholds must lie in [0, 100], got {lower}/{upper}"),
            ));
        }
        if lower >= upper {
            return Err(out_of_range(
                "rsi_lower_threshold",
                format!("lower {lower} must be below upper {upper}"),
            ));
        }
        if !(self.bb_std.is_finite() && self.bb_std > 0.0) {
            return Err(out_of_range("bb_std", format!("must be > 0, got {}", self.bb_std)));
        }
        if !(0.0..=100.0).contains(&self.adx_threshold) {
            return Err(out_of_range(
                "adx_threshold",
                format!("must lie in [0, 100], got {}", self.adx_threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.zone_influence) {
            return Err(out_of_range(
                "zone_influence",
                format!("must lie in [0, 1], got {}", self.zone_influence),
            ));
        }
        Ok(())
    }

    /// Feature lookbacks these parameters need.
    pub fn feature_spec(&self) -> FeatureSpec {
        FeatureSpec {
            rsi_period: self.rsi_period,
            bb_period: self.bb_period,
            bb_std: self.bb_std,
            adx_period: self.adx_period,
            atr_period: self.atr_period,
            momentum_period: self.roc_period,
        }
    }
}

fn mismatch(name: &str, expected: &'static str, got: &ParamValue) -> ParamError {
    ParamError::TypeMismatch {
        name: name.to_string(),
        expected,
        got: format!("{} {got}", got.kind()),
    }
}

fn read_f64(set: &ParameterSet, name: &str, default: f64) -> Result<f64, ParamError> {
    match set.get(name) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|x| x.is_finite())
            .ok_or_else(|| mismatch(name, "a finite number", v)),
    }
}

fn read_usize(set: &ParameterSet, name: &str, default: usize) -> Result<usize, ParamError> {
    match set.get(name) {
        None => Ok(default),
        Some(ParamValue::Int(v)) => {
            usize::try_from(*v).map_err(|_| mismatch(name, "a non-negative integer", &ParamValue::Int(*v)))
        }
        Some(ParamValue::Float(v)) if v.fract() == 0.0 && *v >= 0.0 && v.is_finite() => {
            Ok(*v as usize)
        }
        Some(other) => Err(mismatch(name, "a non-negative integer", other)),
    }
}

fn read_period(set: &ParameterSet, name: &str, default: usize) -> Result<usize, ParamError> {
    let period = read_usize(set, name, default)?;
    if period == 0 {
        return Err(ParamError::OutOfRange {
            name: name.to_string(),
            reason: "period must be >= 1".into(),
        });
    }
    Ok(period)
}

fn read_bool(set: &ParameterSet, name: &str, default: bool) -> Result<bool, ParamError> {
    match set.get(name) {
        None => Ok(default),
        Some(ParamValue::Bool(v)) => Ok(*v),
        Some(other) => Err(mismatch(name, "a boolean", other)),
    }
}

fn read_strictness(
    set: &ParameterSet,
    name: &str,
    default: Strictness,
) -> Result<Strictness, ParamError> {
    match set.get(name) {
        None => Ok(default),
        Some(ParamValue::Text(s)) => s
            .parse()
            .map_err(|_| mismatch(name, "a strictness level", &ParamValue::Text(s.clone()))),
        Some(ParamValue::Int(level)) => usize::try_from(*level)
            .ok()
            .and_then(|i| Strictness::LADDER.get(i).copied())
            .ok_or_else(|| mismatch(name, "a strictness level", &ParamValue::Int(*level))),
        Some(other) => Err(mismatch(name, "a strictness level", other)),
    }
}

// ─── Grid ────────────────────────────────────────────────────────────

/// Name → ordered candidate list. The cross product is the search space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.0.insert(name.into(), values);
        self
    }

    pub fn axes(&self) -> impl Iterator<Item = (&str, &[ParamValue])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of combinations. A grid with no axes has exactly one (the base).
    pub fn size(&self) -> usize {
        self.0
            .values()
            .map(Vec::len)
            .try_fold(1usize, |acc, n| acc.checked_mul(n))
            .unwrap_or(usize::MAX)
    }

    /// Every combination laid over `base`, in odometer order (the last axis
    /// by name varies fastest).
    pub fn expand(&self, base: &ParameterSet, max: usize) -> Result<Vec<ParameterSet>, ParamError> {
        let size = self.size();
        if size > max {
            return Err(ParamError::GridTooLarge { size, max });
        }
        let mut sets = vec![base.clone()];
        for (name, values) in &self.0 {
            sets = sets
                .iter()
                .flat_map(|set| values.iter().map(move |v| set.with(name.clone(), v.clone())))
                .collect();
        }
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_returns_new_instance() {
        let base = ParameterSet::new().with("rsi_period", 14usize);
        let changed = base.with("rsi_period", 21usize);
        assert_eq!(base.get("rsi_period"), Some(&ParamValue::Int(14)));
        assert_eq!(changed.get("rsi_period"), Some(&ParamValue::Int(21)));
    }

    #[test]
    fn equality_and_fingerprint_ignore_insertion_order() {
        let a: ParameterSet = [("a", ParamValue::Int(1)), ("b", ParamValue::Float(2.5))]
            .into_iter()
            .collect();
        let b: ParameterSet = [("b", ParamValue::Float(2.5)), ("a", ParamValue::Int(1))]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_distinguishes_int_and_float() {
        let a = ParameterSet::new().with("x", 1i64);
        let b = ParameterSet::new().with("x", 1.0);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn label_is_sorted() {
        let set = ParameterSet::new().with("zeta", true).with("alpha", 0.5);
        assert_eq!(set.label(), "alpha=0.5;zeta=true");
    }

    #[test]
    fn strategy_params_defaults_from_empty_set() {
        let params = StrategyParams::from_set(&ParameterSet::new()).unwrap();
        assert_eq!(params, StrategyParams::default());
    }

    #[test]
    fn strategy_params_roundtrip_through_set() {
        let params = StrategyParams {
            rsi_lower_threshold: 25.0,
            strictness: Strictness::Relaxed,
            use_regime_filter: true,
            ..StrategyParams::default()
        };
        assert_eq!(StrategyParams::from_set(&params.to_set()).unwrap(), params);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let set = ParameterSet::new().with("rsi_perod", 14usize);
        assert_eq!(
            StrategyParams::from_set(&set),
            Err(ParamError::Unknown("rsi_perod".into()))
        );
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let set = ParameterSet::new()
            .with("rsi_lower_threshold", 70.0)
            .with("rsi_upper_threshold", 30.0);
        assert!(matches!(
            StrategyParams::from_set(&set),
            Err(ParamError::OutOfRange { .. })
        ));
    }

    #[test]
    fn zero_period_is_rejected() {
        let set = ParameterSet::new().with("bb_period", 0usize);
        assert!(matches!(
            StrategyParams::from_set(&set),
            Err(ParamError::OutOfRange { name, .. }) if name == "bb_period"
        ));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let set = ParameterSet::new().with("use_trend_filter", 1i64);
        assert!(matches!(
            StrategyParams::from_set(&set),
            Err(ParamError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn integral_float_period_is_accepted() {
        let set = ParameterSet::new().with("rsi_period", 21.0);
        assert_eq!(StrategyParams::from_set(&set).unwrap().rsi_period, 21);
    }

    #[test]
    fn strictness_accepts_text_and_index() {
        let by_name = ParameterSet::new().with("strictness", "ultra_relaxed");
        let by_index = ParameterSet::new().with("strictness", 2i64);
        assert_eq!(
            StrategyParams::from_set(&by_name).unwrap().strictness,
            Strictness::UltraRelaxed
        );
        assert_eq!(
            StrategyParams::from_set(&by_index).unwrap().strictness,
            Strictness::Relaxed
        );
    }

    #[test]
    fn grid_cross_product_in_odometer_order() {
        let grid = ParamGrid::new()
            .axis("rsi_period", vec![10i64.into(), 14i64.into()])
            .axis("bb_std", vec![1.5.into(), 2.0.into(), 2.5.into()]);
        assert_eq!(grid.size(), 6);
        let sets = grid.expand(&ParameterSet::new(), 512).unwrap();
        assert_eq!(sets.len(), 6);
        // "bb_std" sorts before "rsi_period", so rsi_period varies fastest
        assert_eq!(sets[0].label(), "bb_std=1.5;rsi_period=10");
        assert_eq!(sets[1].label(), "bb_std=1.5;rsi_period=14");
        assert_eq!(sets[5].label(), "bb_std=2.5;rsi_period=14");
    }

    #[test]
    fn grid_overlays_base() {
        let base = ParameterSet::new().with("min_hold_period", 3usize);
        let grid = ParamGrid::new().axis("rsi_period", vec![10i64.into()]);
        let sets = grid.expand(&base, 512).unwrap();
        assert_eq!(sets[0].get("min_hold_period"), Some(&ParamValue::Int(3)));
    }

    #[test]
    fn empty_axis_yields_no_combinations() {
        let grid = ParamGrid::new().axis("rsi_period", vec![]);
        assert!(grid.expand(&ParameterSet::new(), 512).unwrap().is_empty());
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let values: Vec<ParamValue> = (0..30i64).map(ParamValue::Int).collect();
        let grid = ParamGrid::new()
            .axis("a", values.clone())
            .axis("b", values);
        assert_eq!(
            grid.expand(&ParameterSet::new(), 512),
            Err(ParamError::GridTooLarge { size: 900, max: 512 })
        );
    }

    #[test]
    fn untagged_values_deserialize_by_shape() {
        let set: ParameterSet =
            serde_json::from_str(r#"{"a": true, "b": 3, "c": 2.5, "d": "strict"}"#).unwrap();
        assert_eq!(set.get("a"), Some(&ParamValue::Bool(true)));
        assert_eq!(set.get("b"), Some(&ParamValue::Int(3)));
        assert_eq!(set.get("c"), Some(&ParamValue::Float(2.5)));
        assert_eq!(set.get("d"), Some(&ParamValue::Text("strict".into())));
    }
}

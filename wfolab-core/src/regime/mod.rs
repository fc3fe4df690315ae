//! Market regime labels, per-window summaries and the regime classifier.
//!
//! Labels are a closed set. Raw strings from outside (CSV columns, config
//! files) are normalized once via [`RegimeLabel::normalize`]; everything past
//! that boundary matches on the enum.

mod classifier;
mod context;

pub use classifier::{RegimeClassifier, RegimeMode, RegimeThresholds};
pub use context::RegimeContext;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fine-grained regime of a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeLabel {
    TrendingUp,
    TrendingDown,
    Ranging,
    VolatileRange,
    Breakout,
    Breakdown,
    Unknown,
}

impl RegimeLabel {
    pub const ALL: [RegimeLabel; 7] = [
        Self::TrendingUp,
        Self::TrendingDown,
        Self::Ranging,
        Self::VolatileRange,
        Self::Breakout,
        Self::Breakdown,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrendingUp => "trending_up",
            Self::TrendingDown => "trending_down",
            Self::Ranging => "ranging",
            Self::VolatileRange => "volatile_range",
            Self::Breakout => "breakout",
            Self::Breakdown => "breakdown",
            Self::Unknown => "unknown",
        }
    }

    /// Directional regimes: both trends plus breakouts and breakdowns.
    pub fn is_trending(&self) -> bool {
        matches!(
            self,
            Self::TrendingUp | Self::TrendingDown | Self::Breakout | Self::Breakdown
        )
    }

    pub fn simple(&self) -> SimpleRegime {
        match self {
            Self::Unknown => SimpleRegime::Unknown,
            l if l.is_trending() => SimpleRegime::Trending,
            _ => SimpleRegime::Ranging,
        }
    }

    /// Map a raw, possibly missing label onto the closed set.
    ///
    /// Case and separators (`_`, `-`, space) are ignored and common aliases
    /// accepted. Missing or unrecognized input becomes `Unknown`.
    pub fn normalize(raw: Option<&str>) -> RegimeLabel {
        let Some(raw) = raw else {
            return Self::Unknown;
        };
        let key: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' ' | '\t'))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "trendingup" | "trendup" | "uptrend" | "up" | "bull" | "bullish" => Self::TrendingUp,
            "trendingdown" | "trenddown" | "downtrend" | "down" | "bear" | "bearish" => {
                Self::TrendingDown
            }
            "ranging" | "range" | "rangebound" | "sideways" | "choppy" | "mixed" => Self::Ranging,
            "volatilerange" | "volatile" | "highvolatility" | "highvol" => Self::VolatileRange,
            "breakout" => Self::Breakout,
            "breakdown" => Self::Breakdown,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary simplification of [`RegimeLabel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleRegime {
    Trending,
    Ranging,
    Unknown,
}

impl SimpleRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trending => "trending",
            Self::Ranging => "ranging",
            Self::Unknown => "unknown",
        }
    }

    /// Label used when a whole window is adapted to this regime.
    pub fn representative(&self) -> RegimeLabel {
        match self {
            Self::Trending => RegimeLabel::TrendingUp,
            Self::Ranging => RegimeLabel::Ranging,
            Self::Unknown => RegimeLabel::Unknown,
        }
    }
}

impl fmt::Display for SimpleRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label → percentage of bars. Only labels that occur are present.
pub type RegimeSummary = BTreeMap<RegimeLabel, f64>;

pub const DEFAULT_TRENDING_THRESHOLD: f64 = 50.0;

/// Percentage composition of `labels`. Empty input gives an empty summary.
pub fn summarize(labels: &[RegimeLabel]) -> RegimeSummary {
    let mut counts: BTreeMap<RegimeLabel, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(*label).or_default() += 1;
    }
    let total = labels.len() as f64;
    counts
        .into_iter()
        .map(|(label, count)| (label, count as f64 / total * 100.0))
        .collect()
}

/// Trending when the trending share is strictly above `trending_threshold`.
pub fn predominant(summary: &RegimeSummary, trending_threshold: f64) -> SimpleRegime {
    if summary.is_empty() {
        return SimpleRegime::Unknown;
    }
    let trending: f64 = summary
        .iter()
        .filter(|(label, _)| label.is_trending())
        .map(|(_, pct)| pct)
        .sum();
    if trending > trending_threshold {
        SimpleRegime::Trending
    } else {
        SimpleRegime::Ranging
    }
}

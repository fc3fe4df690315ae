//! Signal generation — entry/exit boolean series from features and parameters.
//!
//! Entries come from an ordered strictness ladder; each level admits every
//! entry the level before it admits. Signals see features only, never
//! position state.

mod adapt;
mod ladder;

pub use adapt::{adapt, adapt_params};
pub use ladder::{escalate, generate, generate_with_escalation};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::Feature;

/// Entry strictness, from fewest to most entries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    Strict,
    #[default]
    Balanced,
    Relaxed,
    UltraRelaxed,
}

impl Strictness {
    pub const LADDER: [Strictness; 4] = [
        Self::Strict,
        Self::Balanced,
        Self::Relaxed,
        Self::UltraRelaxed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Balanced => "balanced",
            Self::Relaxed => "relaxed",
            Self::UltraRelaxed => "ultra_relaxed",
        }
    }

    /// Next looser level; `None` at the end of the ladder.
    pub fn next(&self) -> Option<Strictness> {
        match self {
            Self::Strict => Some(Self::Balanced),
            Self::Balanced => Some(Self::Relaxed),
            Self::Relaxed => Some(Self::UltraRelaxed),
            Self::UltraRelaxed => None,
        }
    }

    /// This level and every looser one, in ladder order.
    pub fn ladder_from(self) -> impl Iterator<Item = Strictness> {
        std::iter::successors(Some(self), Strictness::next)
    }

    /// Points the RSI entry thresholds move toward the middle at this level.
    pub fn rsi_widening(&self) -> f64 {
        match self {
            Self::Strict | Self::Balanced => 0.0,
            Self::Relaxed => 5.0,
            Self::UltraRelaxed => 10.0,
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strictness level '{0}'")]
pub struct ParseStrictnessError(String);

impl FromStr for Strictness {
    type Err = ParseStrictnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            "relaxed" => Ok(Self::Relaxed),
            "ultrarelaxed" | "ultra" => Ok(Self::UltraRelaxed),
            _ => Err(ParseStrictnessError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("feature '{0}' is missing or has no values")]
    MissingFeature(Feature),

    #[error("zone flags cover {got} bars, features cover {expected}")]
    ZoneLength { expected: usize, got: usize },
}

/// Four aligned boolean series plus the level that produced them.
///
/// No bar has entry and exit both set on the same side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub long_entry: Vec<bool>,
    pub long_exit: Vec<bool>,
    pub short_entry: Vec<bool>,
    pub short_exit: Vec<bool>,
    pub strictness: Strictness,
}

impl SignalSet {
    pub fn empty(len: usize, strictness: Strictness) -> Self {
        Self {
            long_entry: vec![false; len],
            long_exit: vec![false; len],
            short_entry: vec![false; len],
            short_exit: vec![false; len],
            strictness,
        }
    }

    pub fn len(&self) -> usize {
        self.long_entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.long_entry.is_empty()
    }

    pub fn long_entry_count(&self) -> usize {
        self.long_entry.iter().filter(|&&b| b).count()
    }

    pub fn short_entry_count(&self) -> usize {
        self.short_entry.iter().filter(|&&b| b).count()
    }

    /// Long plus short entries.
    pub fn entry_count(&self) -> usize {
        self.long_entry_count() + self.short_entry_count()
    }
}

//! Serializable walk-forward configuration, loaded from TOML.
//!
//! Every section has defaults, so a config file only needs to name what it
//! changes:
//!
//! ```toml
//! [window]
//! train = 144
//! test = 72
//!
//! [search]
//! metric = "total_return"
//!
//! [evaluation]
//! policy = "relaxed"
//!
//! [grid]
//! rsi_period = [10, 14]
//! bb_std = [1.5, 2.0]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wfolab_core::regime::{RegimeClassifier, RegimeMode, RegimeThresholds, DEFAULT_TRENDING_THRESHOLD};
use wfolab_core::{ParamError, ParamGrid, ParameterSet, StrategyParams, Strictness};

use crate::costs::CostModel;
use crate::evaluator::{EvaluationPolicy, StrategyEvaluator};
use crate::metrics::DEFAULT_PERIODS_PER_YEAR;
use crate::search::SearchConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid parameters: {0}")]
    Params(#[from] ParamError),
}

// ─── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub train: usize,
    pub test: usize,
    /// Defaults to `test`, giving back-to-back test windows.
    pub step: Option<usize>,
    pub max_splits: Option<usize>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            train: 144,
            test: 72,
            step: None,
            max_splits: None,
        }
    }
}

impl WindowConfig {
    pub fn step_size(&self) -> usize {
        self.step.unwrap_or(self.test)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPreset {
    Standard,
    Relaxed,
}

/// `policy = "relaxed"` or an explicit `[evaluation.policy]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicySetting {
    Preset(PolicyPreset),
    Custom(EvaluationPolicy),
}

impl Default for PolicySetting {
    fn default() -> Self {
        Self::Preset(PolicyPreset::Standard)
    }
}

impl PolicySetting {
    pub fn resolve(&self) -> EvaluationPolicy {
        match self {
            Self::Preset(PolicyPreset::Standard) => EvaluationPolicy::default(),
            Self::Preset(PolicyPreset::Relaxed) => EvaluationPolicy::relaxed(),
            Self::Custom(policy) => policy.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub policy: PolicySetting,
    pub costs: CostModel,
    pub min_entry_signals: usize,
    pub periods_per_year: f64,
    /// Starting ladder level for sets that do not name one.
    pub strictness: Strictness,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            policy: PolicySetting::default(),
            costs: CostModel::default(),
            min_entry_signals: 5,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            strictness: Strictness::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub mode: RegimeMode,
    pub thresholds: RegimeThresholds,
    /// Trending share (percent) above which a window counts as trending.
    pub trending_threshold: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            mode: RegimeMode::default(),
            thresholds: RegimeThresholds::default(),
            trending_threshold: DEFAULT_TRENDING_THRESHOLD,
        }
    }
}

// ─── Top level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WfoConfig {
    pub window: WindowConfig,
    pub search: SearchConfig,
    pub evaluation: EvaluationConfig,
    pub regime: RegimeConfig,
    pub grid: ParamGrid,
    pub base_params: ParameterSet,
}

impl WfoConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.window;
        if w.train == 0 || w.test == 0 || w.step_size() == 0 {
            return Err(ConfigError::Invalid(format!(
                "window sizes must be positive (train {}, test {}, step {})",
                w.train,
                w.test,
                w.step_size()
            )));
        }
        if !(0.0..=100.0).contains(&self.regime.trending_threshold) {
            return Err(ConfigError::Invalid(format!(
                "regime.trending_threshold must lie in [0, 100], got {}",
                self.regime.trending_threshold
            )));
        }
        if self.search.workers == Some(0) {
            return Err(ConfigError::Invalid("search.workers must be at least 1".into()));
        }
        if self.search.max_grid_size == 0 {
            return Err(ConfigError::Invalid("search.max_grid_size must be at least 1".into()));
        }
        let size = self.grid.size();
        if size > self.search.max_grid_size {
            return Err(ParamError::GridTooLarge {
                size,
                max: self.search.max_grid_size,
            }
            .into());
        }
        StrategyParams::from_set(&self.base())?;
        Ok(())
    }

    /// Base parameters with the configured default strictness filled in.
    pub fn base(&self) -> ParameterSet {
        if self.base_params.get("strictness").is_some() {
            self.base_params.clone()
        } else {
            self.base_params.with("strictness", self.evaluation.strictness)
        }
    }

    /// The expanded grid laid over the base parameters.
    pub fn candidates(&self) -> Result<Vec<ParameterSet>, ConfigError> {
        Ok(self.grid.expand(&self.base(), self.search.max_grid_size)?)
    }

    pub fn evaluator(&self) -> StrategyEvaluator {
        StrategyEvaluator {
            policy: self.evaluation.policy.resolve(),
            costs: self.evaluation.costs.clone(),
            min_entry_signals: self.evaluation.min_entry_signals,
            periods_per_year: self.evaluation.periods_per_year,
        }
    }

    pub fn classifier(&self) -> RegimeClassifier {
        RegimeClassifier::new(self.regime.thresholds.clone(), self.regime.mode)
    }
}

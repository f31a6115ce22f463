//! Analysis configuration.
//!
//! Stored as a JSON file on disk; every field is optional:
//! ```json
//! {
//!   "classifier": {
//!     "healthy_score_swamp_threshold": 10.0,
//!     "healthy_score_max": 100.0,
//!     "scarce_retailer_threshold": 3
//!   },
//!   "ranking": { "highest_need_limit": 15 },
//!   "spikes": { "z_threshold": 2.0 },
//!   "seasonality": { "year_weights": { "2024": 2.0 } },
//!   "drivers": { "max_lag": 6, "smoothing_window": 3, "peak_from_year": 2020, "peak_to_year": 2021 },
//!   "history": { "recent_from_year": 2020 }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Score below which an area with retailers is a food swamp.
pub const DEFAULT_SWAMP_THRESHOLD: f64 = 10.0;
/// Upper end of the mRFEI score scale.
pub const DEFAULT_SCORE_MAX: f64 = 100.0;
pub const DEFAULT_HIGHEST_NEED_LIMIT: usize = 15;
pub const DEFAULT_SPIKE_Z_THRESHOLD: f64 = 2.0;
pub const DEFAULT_MAX_LAG: u32 = 6;
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;
/// The pandemic recession, when unemployment and demand both peaked.
pub const DEFAULT_PEAK_YEARS: (i32, i32) = (2020, 2021);
pub const DEFAULT_RECENT_FROM_YEAR: i32 = 2020;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub classifier: ClassifierConfig,
    pub ranking: RankingConfig,
    pub spikes: SpikeConfig,
    pub seasonality: SeasonalityConfig,
    pub drivers: DriverConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Compared against the raw score column, with no rescaling.
    pub healthy_score_swamp_threshold: f64,
    /// Scores outside `0.0..=healthy_score_max` are invalid records.
    pub healthy_score_max: f64,
    /// Areas with fewer retailers than this are "Scarce". Disabled when `None`.
    pub scarce_retailer_threshold: Option<i64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            healthy_score_swamp_threshold: DEFAULT_SWAMP_THRESHOLD,
            healthy_score_max: DEFAULT_SCORE_MAX,
            scarce_retailer_threshold: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub highest_need_limit: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            highest_need_limit: DEFAULT_HIGHEST_NEED_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    pub z_threshold: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_SPIKE_Z_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    /// Per-year multiplier; years not listed weigh 1.0.
    pub year_weights: BTreeMap<i32, f64>,
}

/// Unemployment-versus-demand settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Largest lag, in months, tried by the lagged correlation.
    pub max_lag: u32,
    /// Trailing window, in months, smoothed before finding peaks.
    pub smoothing_window: usize,
    pub peak_from_year: i32,
    pub peak_to_year: i32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_lag: DEFAULT_MAX_LAG,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            peak_from_year: DEFAULT_PEAK_YEARS.0,
            peak_to_year: DEFAULT_PEAK_YEARS.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// First year whose benefit changes count as recent.
    pub recent_from_year: i32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_from_year: DEFAULT_RECENT_FROM_YEAR,
        }
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        debug!(path, ?config, "Loaded analysis config");
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Loads `path` when given, otherwise falls back to defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

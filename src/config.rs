//! Engine and run configuration
//!
//! Values only; the command line and TOML files both resolve into these structs.

use crate::distance::DEFAULT_METRIC;
use crate::error::{EngineError, Result};
use crate::miner::MinSupport;
use crate::preprocess::PreprocessConfig;
use crate::scorer::DEFAULT_EXTENT;
use crate::threshold::{DEFAULT_NUM_BINS, DEFAULT_RARITY};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters of the detection and explanation engine
///
/// # Example
/// ```
/// use qc_outliers::config::EngineConfig;
///
/// let config = EngineConfig::new(5);
/// assert_eq!(config.distance, "manhattan");
/// assert_eq!(config.num_bins, 20);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of nearest neighbors (required)
    pub k: usize,

    /// Distance metric name, resolved through the metric registry
    #[serde(default = "default_distance")]
    pub distance: String,

    /// Fixed outlier score threshold in `[0, 1]`; derived from the score
    /// histogram when absent
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Histogram bins for threshold derivation
    #[serde(default = "default_num_bins")]
    pub num_bins: usize,

    /// Tail rarity criterion for threshold derivation
    #[serde(default = "default_tail_rarity")]
    pub tail_rarity: f64,

    /// LoOP extent λ
    #[serde(default = "default_extent")]
    pub extent: f64,

    /// Minimum support of reported frequent subspaces
    #[serde(default)]
    pub min_support: MinSupport,

    /// Minimum size of reported frequent subspaces
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Maximum size of reported frequent subspaces (unbounded when absent)
    #[serde(default)]
    pub max_length: Option<usize>,

    /// Worker threads for per-outlier explanation (1 = sequential)
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_distance() -> String {
    DEFAULT_METRIC.to_string()
}

fn default_num_bins() -> usize {
    DEFAULT_NUM_BINS
}

fn default_tail_rarity() -> f64 {
    DEFAULT_RARITY
}

fn default_extent() -> f64 {
    DEFAULT_EXTENT
}

fn default_min_length() -> usize {
    1
}

fn default_workers() -> usize {
    1
}

impl EngineConfig {
    /// Defaults for everything except `k`
    pub fn new(k: usize) -> Self {
        Self {
            k,
            distance: default_distance(),
            threshold: None,
            num_bins: default_num_bins(),
            tail_rarity: default_tail_rarity(),
            extent: default_extent(),
            min_support: MinSupport::default(),
            min_length: default_min_length(),
            max_length: None,
            workers: default_workers(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(EngineError::InvalidConfig(msg)) };

        if self.k == 0 {
            return invalid("k must be a positive number of neighbors".to_string());
        }
        if let Some(t) = self.threshold {
            if !(0.0..=1.0).contains(&t) {
                return invalid(format!("threshold must be in [0, 1], got {}", t));
            }
        }
        if self.num_bins == 0 {
            return invalid("num_bins must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.tail_rarity) {
            return invalid(format!(
                "tail_rarity must be in [0, 1], got {}",
                self.tail_rarity
            ));
        }
        if !self.extent.is_finite() || self.extent <= 0.0 {
            return invalid(format!("extent must be positive, got {}", self.extent));
        }
        self.min_support.validate()?;
        if self.min_length == 0 {
            return invalid("min_length must be at least 1".to_string());
        }
        if let Some(max) = self.max_length {
            if max < self.min_length {
                return invalid(format!(
                    "max_length {} is below min_length {}",
                    max, self.min_length
                ));
            }
        }
        if self.workers == 0 {
            return invalid("workers must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Full run configuration as stored in a TOML file
///
/// # Example TOML
/// ```toml
/// [engine]
/// k = 5
/// distance = "euclidean"
/// num_bins = 25
/// min_support = { absolute = 3 }
///
/// [preprocess]
/// min_variance = 0.0001
/// min_correlation = 0.9
/// scaling = "robust"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub engine: EngineConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

impl RunConfig {
    /// Load and validate a run configuration from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: RunConfig =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.engine.validate()?;
        config.preprocess.validate()?;
        Ok(config)
    }
}

//! CLI argument parsing for qc-outliers

use crate::config::{EngineConfig, RunConfig};
use crate::miner::MinSupport;
use crate::preprocess::{PreprocessConfig, ScalingMode};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the analysis report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    Text,
    /// JSON document for downstream reporting
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "qc-outliers")]
#[command(version)]
#[command(
    about = "Detect and explain outlying mass spectrometry runs from QC metrics",
    long_about = None
)]
pub struct Cli {
    /// Tab-separated QC metric table (`-` reads stdin)
    #[arg(value_name = "FILE")]
    pub file_in: PathBuf,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Load settings from a TOML file; flags given on the command line take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of nearest neighbors used for outlier detection
    #[arg(short = 'k', long = "k-neighbors", required_unless_present = "config")]
    pub k: Option<usize>,

    /// Distance metric (manhattan, euclidean, chebyshev, canberra, minkowski:<p>)
    #[arg(short = 'd', long = "distance", value_name = "METRIC")]
    pub distance: Option<String>,

    /// Fixed outlier score threshold; derived from the score histogram when omitted
    #[arg(long = "min-outlier", value_name = "SCORE")]
    pub min_outlier: Option<f64>,

    /// Number of bins of the outlier score histogram
    #[arg(long = "num-bins")]
    pub num_bins: Option<usize>,

    /// Minimum subspace support: positive = percent of outliers, negative = absolute count
    #[arg(long = "min-sup", allow_negative_numbers = true)]
    pub min_sup: Option<f64>,

    /// Minimum number of metrics in a reported subspace
    #[arg(long = "min-length")]
    pub min_length: Option<usize>,

    /// Maximum number of metrics in a reported subspace
    #[arg(long = "max-length")]
    pub max_length: Option<usize>,

    /// Metrics with a lower variance are removed
    #[arg(long = "min-var")]
    pub min_var: Option<f64>,

    /// Of two metrics with a higher correlation, the later one is removed
    #[arg(long = "min-corr")]
    pub min_corr: Option<f64>,

    /// How metric values are standardized
    #[arg(long = "scaling-mode", value_enum)]
    pub scaling_mode: Option<ScalingMode>,

    /// Skip variance filtering, correlation pruning and scaling
    #[arg(long = "no-preprocess")]
    pub no_preprocess: bool,

    /// Worker threads for explaining outliers
    #[arg(short = 'j', long = "workers")]
    pub workers: Option<usize>,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Merge the optional config file with command-line overrides
    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_toml(path)?,
            None => {
                let k = self
                    .k
                    .context("-k/--k-neighbors is required without --config")?;
                RunConfig {
                    engine: EngineConfig::new(k),
                    preprocess: PreprocessConfig::default(),
                }
            }
        };

        let engine = &mut config.engine;
        if let Some(k) = self.k {
            engine.k = k;
        }
        if let Some(distance) = &self.distance {
            engine.distance = distance.clone();
        }
        if let Some(threshold) = self.min_outlier {
            engine.threshold = Some(threshold);
        }
        if let Some(num_bins) = self.num_bins {
            engine.num_bins = num_bins;
        }
        if let Some(min_sup) = self.min_sup {
            engine.min_support = MinSupport::from_signed(min_sup)?;
        }
        if let Some(min_length) = self.min_length {
            engine.min_length = min_length;
        }
        if self.max_length.is_some() {
            engine.max_length = self.max_length;
        }
        if let Some(workers) = self.workers {
            engine.workers = workers;
        }

        let preprocess = &mut config.preprocess;
        if let Some(min_var) = self.min_var {
            preprocess.min_variance = min_var;
        }
        if let Some(min_corr) = self.min_corr {
            preprocess.min_correlation = min_corr;
        }
        if let Some(scaling) = self.scaling_mode {
            preprocess.scaling = scaling;
        }

        config.engine.validate()?;
        config.preprocess.validate()?;
        Ok(config)
    }
}

//! qc-outliers - Outlier detection and explanation for mass spectrometry QC metrics
//!
//! This library scores experiments by their local outlier probability over a
//! table of quality-control metrics, derives a score threshold, explains each
//! outlier by the metric subspace that best accounts for its score, and mines
//! subspaces that recur across many outliers.

pub mod cli;
pub mod config;
pub mod distance;
pub mod error;
pub mod explainer;
pub mod input;
pub mod matrix;
pub mod miner;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod scorer;
pub mod split;
pub mod threshold;

pub use config::{EngineConfig, RunConfig};
pub use distance::{DistanceIndex, DistanceMetric, MetricRegistry, Neighbor};
pub use error::{EngineError, Result};
pub use explainer::{Explanation, Subspace, SubspaceExplainer};
pub use matrix::MetricMatrix;
pub use miner::{FrequentSubspace, MinSupport, SubspaceMiner};
pub use pipeline::{analyze, OutlierPipeline};
pub use report::{AnalysisReport, OutlierRecord};
pub use scorer::{OutlierScorer, OutlierScores};
pub use split::{split, Split};
pub use threshold::ThresholdEstimator;

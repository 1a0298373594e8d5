//! Detection and explanation pipeline
//!
//! Runs the stages in order over an already preprocessed matrix:
//! score → threshold (only when none is configured) → split → explain each
//! outlier → mine frequent subspaces. Every stage is a pure function of its
//! inputs; the pipeline only threads results through and assembles the report.

use crate::config::EngineConfig;
use crate::distance::{check_neighbor_count, DistanceIndex, MetricRegistry};
use crate::error::Result;
use crate::explainer::{Subspace, SubspaceExplainer};
use crate::matrix::MetricMatrix;
use crate::miner::SubspaceMiner;
use crate::report::{AnalysisReport, OutlierRecord};
use crate::scorer::OutlierScorer;
use crate::split::split;
use crate::threshold::ThresholdEstimator;

/// Outlier detection and explanation over QC metric matrices
#[derive(Debug, Clone)]
pub struct OutlierPipeline {
    config: EngineConfig,
    registry: MetricRegistry,
}

impl OutlierPipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: MetricRegistry::new(),
        }
    }

    /// Use a registry carrying custom distance metrics
    pub fn with_registry(mut self, registry: MetricRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full analysis on `matrix`
    ///
    /// # Errors
    /// Any stage error aborts the run and is returned unchanged.
    pub fn analyze(&self, matrix: &MetricMatrix) -> Result<AnalysisReport> {
        let config = &self.config;
        config.validate()?;

        let metric = self.registry.resolve(&config.distance)?;
        check_neighbor_count(config.k, matrix.n_rows())?;

        let index = DistanceIndex::build(matrix, metric.as_ref())?;
        let scores = OutlierScorer::new(config.k)
            .with_extent(config.extent)
            .score(matrix, &index)?;

        let (threshold, threshold_derived) = match config.threshold {
            Some(t) => (t, false),
            None => {
                let t = ThresholdEstimator::new(config.num_bins)
                    .with_rarity(config.tail_rarity)
                    .estimate(scores.values())?;
                (t, true)
            }
        };

        let parts = split(matrix, &scores, threshold)?;

        let rows: Vec<usize> = parts.outliers.iter().map(|o| o.row).collect();
        let explanations = SubspaceExplainer::new(matrix, metric.as_ref(), &index, config.k)?
            .with_extent(config.extent)
            .explain_all(&rows, config.workers)?;

        let outliers: Vec<OutlierRecord> = parts
            .outliers
            .into_iter()
            .zip(explanations)
            .map(|(row, explanation)| OutlierRecord {
                id: row.id,
                score: row.score,
                subspace: explanation.subspace,
                feature_importance: explanation.feature_importance,
            })
            .collect();

        let subspaces: Vec<Subspace> = outliers.iter().map(|o| o.subspace.clone()).collect();
        let frequent_subspaces = SubspaceMiner::new(config.min_support, config.min_length)
            .with_max_length(config.max_length)
            .mine(&subspaces)?;
        let min_support_count = config.min_support.resolve(outliers.len())?;

        tracing::info!(
            experiments = matrix.n_rows(),
            metrics = matrix.n_cols(),
            threshold,
            threshold_derived,
            outliers = outliers.len(),
            frequent_subspaces = frequent_subspaces.len(),
            "outlier analysis complete"
        );

        Ok(AnalysisReport {
            metrics: matrix.metrics().to_vec(),
            scores,
            threshold,
            threshold_derived,
            num_bins: config.num_bins,
            inliers: parts.inliers.experiments().to_vec(),
            outliers,
            frequent_subspaces,
            min_support: config.min_support,
            min_support_count,
            min_length: config.min_length,
            max_length: config.max_length,
            preprocessing: None,
        })
    }
}

/// Run the analysis with the built-in distance metrics
pub fn analyze(matrix: &MetricMatrix, config: &EngineConfig) -> Result<AnalysisReport> {
    OutlierPipeline::new(config.clone()).analyze(matrix)
}

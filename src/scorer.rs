//! Local outlier probabilities (LoOP)
//!
//! Scores each experiment by how isolated it is relative to its k nearest
//! neighbors, following Kriegel et al. (2009):
//!
//! - `pdist(o) = λ · sqrt(mean_{s ∈ kNN(o)} d(o, s)²)` is the probabilistic set distance
//! - `PLOF(o) = pdist(o) / mean_{s ∈ kNN(o)} pdist(s) − 1`
//! - `nPLOF = λ · sqrt(mean_o PLOF(o)²)`
//! - `LoOP(o) = max(0, erf(PLOF(o) / (nPLOF · √2)))`
//!
//! The result is bounded in `[0, 1]`. A neighborhood whose expected pdist is zero
//! yields `PLOF = 0`, and `nPLOF = 0` yields a score of zero everywhere.
//!
//! # References
//!
//! Kriegel, H.-P., Kröger, P., Schubert, E., & Zimek, A. (2009). LoOP: Local
//! Outlier Probabilities. In CIKM '09 (pp. 1649-1652).

use crate::distance::{check_neighbor_count, DistanceIndex, DistanceMetric, Neighbor};
use crate::error::Result;
use crate::matrix::MetricMatrix;
use serde::Serialize;
use statrs::function::erf::erf;

/// Default extent λ (three standard deviations)
pub const DEFAULT_EXTENT: f64 = 3.0;

/// One outlier score per experiment, in matrix row order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierScores {
    ids: Vec<String>,
    values: Vec<f64>,
    pub k: usize,
    pub metric: String,
}

impl OutlierScores {
    pub(crate) fn new(ids: Vec<String>, values: Vec<f64>, k: usize, metric: String) -> Self {
        Self {
            ids,
            values,
            k,
            metric,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Score of experiment `id`
    pub fn get(&self, id: &str) -> Option<f64> {
        self.ids
            .iter()
            .position(|e| e == id)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ids.iter().map(String::as_str).zip(self.values.iter().copied())
    }

    /// Experiment ids ordered by descending score (ties by row order)
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// Probabilistic set distance of a point given its neighbor distances
pub fn probabilistic_distance(neighbors: &[Neighbor], extent: f64) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }
    let mean_sq =
        neighbors.iter().map(|n| n.distance * n.distance).sum::<f64>() / neighbors.len() as f64;
    extent * mean_sq.sqrt()
}

/// Probabilistic local outlier factor
///
/// Returns 0 when the neighborhood's expected pdist is zero.
pub fn local_outlier_factor(pdist: f64, neighbor_pdists: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = neighbor_pdists.fold((0.0, 0usize), |(s, c), p| (s + p, c + 1));
    if count == 0 {
        return 0.0;
    }
    let expected = sum / count as f64;
    if expected <= 0.0 {
        return 0.0;
    }
    pdist / expected - 1.0
}

/// Map a PLOF value onto `[0, 1]` with the normalized error function
pub fn outlier_probability(plof: f64, nplof: f64) -> f64 {
    if nplof.is_nan() || nplof <= 0.0 || !plof.is_finite() {
        return 0.0;
    }
    erf(plof / (nplof * std::f64::consts::SQRT_2)).clamp(0.0, 1.0)
}

/// LoOP scorer over a full distance index
#[derive(Debug, Clone, Copy)]
pub struct OutlierScorer {
    k: usize,
    extent: f64,
}

impl OutlierScorer {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            extent: DEFAULT_EXTENT,
        }
    }

    pub fn with_extent(mut self, extent: f64) -> Self {
        self.extent = extent;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn extent(&self) -> f64 {
        self.extent
    }

    /// Score every experiment of `matrix` using a prebuilt `index`
    ///
    /// # Errors
    /// `InsufficientData` if `k >= n`.
    pub fn score(&self, matrix: &MetricMatrix, index: &DistanceIndex) -> Result<OutlierScores> {
        let n = matrix.n_rows();
        check_neighbor_count(self.k, n)?;

        let neighborhoods = (0..n)
            .map(|i| index.neighbors(i, self.k))
            .collect::<Result<Vec<_>>>()?;

        let pdists: Vec<f64> = neighborhoods
            .iter()
            .map(|nn| probabilistic_distance(nn, self.extent))
            .collect();

        let plofs: Vec<f64> = neighborhoods
            .iter()
            .zip(&pdists)
            .map(|(nn, &pdist)| local_outlier_factor(pdist, nn.iter().map(|s| pdists[s.index])))
            .collect();

        let nplof = self.extent * (plofs.iter().map(|p| p * p).sum::<f64>() / n as f64).sqrt();

        let values: Vec<f64> = plofs
            .iter()
            .map(|&plof| outlier_probability(plof, nplof))
            .collect();

        tracing::debug!(
            experiments = n,
            k = self.k,
            nplof,
            max_score = values.iter().copied().fold(0.0, f64::max),
            "computed local outlier probabilities"
        );

        Ok(OutlierScores::new(
            matrix.experiments().to_vec(),
            values,
            self.k,
            index.metric_name().to_string(),
        ))
    }
}

/// Build a distance index for `matrix` and score it
pub fn score(matrix: &MetricMatrix, k: usize, metric: &dyn DistanceMetric) -> Result<OutlierScores> {
    check_neighbor_count(k, matrix.n_rows())?;
    let index = DistanceIndex::build(matrix, metric)?;
    OutlierScorer::new(k).score(matrix, &index)
}

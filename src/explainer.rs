//! Explanatory subspaces for individual outliers
//!
//! For one outlier the explainer searches for the subset of metrics in which
//! the experiment deviates most from its local neighborhood. Deviation is the
//! probabilistic local outlier factor (PLOF) of the outlier with distances
//! restricted to the candidate columns, always computed against the full
//! population (outliers included).
//!
//! Search policy: backward elimination. Starting from all metrics, every
//! one-metric removal is evaluated and the best candidate (highest deviation,
//! ties to the lexically smallest name list) replaces the current subspace when
//! it explains at least as much. The search stops when every removal loses
//! deviation or a single metric is left.
//!
//! Feature importance of a metric is its marginal contribution: how much the
//! deviation drops when that one metric is removed from the final subspace,
//! normalized to sum to 1.

use crate::distance::{
    check_neighbor_count, checked_distance, nearest, DistanceIndex, DistanceMetric, Neighbor,
};
use crate::error::{EngineError, Result};
use crate::matrix::MetricMatrix;
use crate::scorer::{local_outlier_factor, probabilistic_distance, DEFAULT_EXTENT};
use serde::Serialize;
use std::collections::BTreeSet;

/// Deviations closer than this are treated as equal
const DEVIATION_TOLERANCE: f64 = 1e-12;

/// Unordered, lexically iterated set of metric names
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Subspace(BTreeSet<String>);

impl Subspace {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.0.contains(metric)
    }

    pub fn is_superset(&self, other: &Subspace) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Subspace {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Subspace(iter.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for Subspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Why one outlier is anomalous
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub subspace: Subspace,
    /// One weight per subspace metric, in subspace order, summing to 1
    pub feature_importance: Vec<(String, f64)>,
    /// Local deviation (PLOF) of the outlier in the selected subspace
    pub deviation: f64,
}

/// Greedy subspace search over one full matrix
///
/// Full-dimensional neighborhoods come from the shared [`DistanceIndex`];
/// restricted neighborhoods are computed on projected columns and never touch it.
pub struct SubspaceExplainer<'a> {
    matrix: &'a MetricMatrix,
    metric: &'a dyn DistanceMetric,
    index: &'a DistanceIndex,
    k: usize,
    extent: f64,
}

impl<'a> SubspaceExplainer<'a> {
    /// # Errors
    /// `InsufficientData` if `k >= n`, `DegenerateInput` if `index` was built
    /// for a different matrix, `InvalidMetric` if it was built with a metric
    /// other than `metric`.
    pub fn new(
        matrix: &'a MetricMatrix,
        metric: &'a dyn DistanceMetric,
        index: &'a DistanceIndex,
        k: usize,
    ) -> Result<Self> {
        check_neighbor_count(k, matrix.n_rows())?;
        if index.len() != matrix.n_rows() {
            return Err(EngineError::DegenerateInput(format!(
                "distance index covers {} experiments, matrix has {}",
                index.len(),
                matrix.n_rows()
            )));
        }
        if index.metric_name() != metric.name() {
            return Err(EngineError::InvalidMetric(format!(
                "distance index was built with '{}', explainer uses '{}'",
                index.metric_name(),
                metric.name()
            )));
        }
        Ok(Self {
            matrix,
            metric,
            index,
            k,
            extent: DEFAULT_EXTENT,
        })
    }

    pub fn with_extent(mut self, extent: f64) -> Self {
        self.extent = extent;
        self
    }

    /// Explain the outlier at matrix row `row`
    pub fn explain(&self, row: usize) -> Result<Explanation> {
        if row >= self.matrix.n_rows() {
            return Err(EngineError::DegenerateInput(format!(
                "row {} is outside the matrix ({} experiments)",
                row,
                self.matrix.n_rows()
            )));
        }

        let mut current: Vec<usize> = (0..self.matrix.n_cols()).collect();
        let mut current_dev = self.deviation(row, &current)?;

        while current.len() > 1 {
            let mut best: Option<(Vec<usize>, f64)> = None;
            for pos in 0..current.len() {
                let mut candidate = current.clone();
                candidate.remove(pos);
                let dev = self.deviation(row, &candidate)?;
                let better = match &best {
                    None => true,
                    Some((best_cols, best_dev)) => {
                        dev > best_dev + DEVIATION_TOLERANCE
                            || ((dev - best_dev).abs() <= DEVIATION_TOLERANCE
                                && self.sorted_names(&candidate) < self.sorted_names(best_cols))
                    }
                };
                if better {
                    best = Some((candidate, dev));
                }
            }

            match best {
                Some((candidate, dev)) if dev + DEVIATION_TOLERANCE >= current_dev => {
                    tracing::trace!(
                        experiment = %self.matrix.experiments()[row],
                        remaining = candidate.len(),
                        deviation = dev,
                        "dropped metric from subspace"
                    );
                    current = candidate;
                    current_dev = dev;
                }
                _ => break,
            }
        }

        let feature_importance = self.importance(row, &current, current_dev)?;
        let subspace: Subspace = current
            .iter()
            .map(|&j| self.matrix.metrics()[j].as_str())
            .collect();

        tracing::debug!(
            experiment = %self.matrix.experiments()[row],
            subspace = %subspace,
            deviation = current_dev,
            "explained outlier"
        );

        Ok(Explanation {
            subspace,
            feature_importance,
            deviation: current_dev,
        })
    }

    /// Explain several outliers, optionally fanned out over `workers` threads
    ///
    /// Output order follows `rows` regardless of the worker count.
    pub fn explain_all(&self, rows: &[usize], workers: usize) -> Result<Vec<Explanation>> {
        if workers <= 1 || rows.len() <= 1 {
            return rows.iter().map(|&row| self.explain(row)).collect();
        }

        let chunk_size = rows.len().div_ceil(workers);
        let chunks: Vec<Result<Vec<Explanation>>> = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = rows
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move |_| {
                        chunk
                            .iter()
                            .map(|&row| self.explain(row))
                            .collect::<Result<Vec<_>>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)))
                .collect()
        })
        .unwrap_or_else(|p| std::panic::resume_unwind(p));

        let mut explanations = Vec::with_capacity(rows.len());
        for chunk in chunks {
            explanations.extend(chunk?);
        }
        Ok(explanations)
    }

    /// PLOF of `row` with distances restricted to `cols`
    fn deviation(&self, row: usize, cols: &[usize]) -> Result<f64> {
        if cols.len() == self.matrix.n_cols() {
            return local_deviation(row, self.extent, |i| self.index.neighbors(i, self.k));
        }

        let projected = self.matrix.select_columns(cols);
        local_deviation(row, self.extent, |i| {
            let candidates = (0..projected.n_rows())
                .filter(|&j| j != i)
                .map(|j| {
                    checked_distance(self.metric, &projected, i, j)
                        .map(|distance| Neighbor { index: j, distance })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(nearest(candidates.into_iter(), projected.experiments(), self.k))
        })
    }

    fn importance(&self, row: usize, cols: &[usize], dev: f64) -> Result<Vec<(String, f64)>> {
        let names = |j: usize| self.matrix.metrics()[j].clone();
        if cols.len() == 1 {
            return Ok(vec![(names(cols[0]), 1.0)]);
        }

        let mut contributions = Vec::with_capacity(cols.len());
        for pos in 0..cols.len() {
            let mut without = cols.to_vec();
            without.remove(pos);
            let drop = (dev - self.deviation(row, &without)?).max(0.0);
            contributions.push((names(cols[pos]), drop));
        }

        let total: f64 = contributions.iter().map(|(_, c)| c).sum();
        let uniform = 1.0 / cols.len() as f64;
        let mut weights: Vec<(String, f64)> = contributions
            .into_iter()
            .map(|(name, c)| {
                let w = if total > 0.0 { c / total } else { uniform };
                (name, w)
            })
            .collect();
        weights.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(weights)
    }

    fn sorted_names(&self, cols: &[usize]) -> Vec<&str> {
        let mut names: Vec<&str> = cols
            .iter()
            .map(|&j| self.matrix.metrics()[j].as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

fn local_deviation<F>(row: usize, extent: f64, neighbors: F) -> Result<f64>
where
    F: Fn(usize) -> Result<Vec<Neighbor>>,
{
    let nn = neighbors(row)?;
    let pdist = probabilistic_distance(&nn, extent);
    let neighbor_pdists = nn
        .iter()
        .map(|s| neighbors(s.index).map(|snn| probabilistic_distance(&snn, extent)))
        .collect::<Result<Vec<f64>>>()?;
    Ok(local_outlier_factor(pdist, neighbor_pdists.into_iter()))
}

/// Build an index for `matrix` and explain the outlier at `row`
pub fn explain(
    matrix: &MetricMatrix,
    row: usize,
    k: usize,
    metric: &dyn DistanceMetric,
) -> Result<Explanation> {
    check_neighbor_count(k, matrix.n_rows())?;
    let index = DistanceIndex::build(matrix, metric)?;
    SubspaceExplainer::new(matrix, metric, &index, k)?.explain(row)
}

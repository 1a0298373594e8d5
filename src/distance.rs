//! Distance metrics and k-nearest-neighbor index
//!
//! Metrics are resolved by name through a [`MetricRegistry`] so the engine never
//! depends on a particular metric implementation. The [`DistanceIndex`] holds the
//! full pairwise distance table for one matrix and answers k-NN queries; it is
//! built once and shared read-only between scoring and explanation.

use crate::error::{EngineError, Result};
use crate::matrix::MetricMatrix;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Default metric name
pub const DEFAULT_METRIC: &str = "manhattan";

/// A distance function: `d(x, y) >= 0`, symmetric, `d(x, x) = 0`
pub trait DistanceMetric: fmt::Debug + Send + Sync {
    /// Canonical name used in reports
    fn name(&self) -> &str;

    /// Distance between two equally sized vectors
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;
}

/// L1 / city block distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Manhattan;

impl DistanceMetric for Manhattan {
    fn name(&self) -> &str {
        "manhattan"
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
    }
}

/// L2 distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl DistanceMetric for Euclidean {
    fn name(&self) -> &str {
        "euclidean"
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// L-infinity distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Chebyshev;

impl DistanceMetric for Chebyshev {
    fn name(&self) -> &str {
        "chebyshev"
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }
}

/// Canberra distance; terms where both coordinates are zero contribute nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Canberra;

impl DistanceMetric for Canberra {
    fn name(&self) -> &str {
        "canberra"
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| {
                let denom = x.abs() + y.abs();
                if denom > 0.0 {
                    (x - y).abs() / denom
                } else {
                    0.0
                }
            })
            .sum()
    }
}

/// Minkowski distance of order `p >= 1`
#[derive(Debug, Clone)]
pub struct Minkowski {
    p: f64,
    name: String,
}

impl Minkowski {
    pub fn new(p: f64) -> Result<Self> {
        if !p.is_finite() || p < 1.0 {
            return Err(EngineError::InvalidMetric(format!(
                "minkowski order must be a finite number >= 1, got {}",
                p
            )));
        }
        Ok(Self {
            p,
            name: format!("minkowski:{}", p),
        })
    }
}

impl DistanceMetric for Minkowski {
    fn name(&self) -> &str {
        &self.name
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs().powf(self.p))
            .sum::<f64>()
            .powf(1.0 / self.p)
    }
}

/// Name → metric mapping resolved at configuration time
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    metrics: HashMap<String, Arc<dyn DistanceMetric>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    /// Registry with the built-in metrics and their aliases
    pub fn new() -> Self {
        let mut metrics: HashMap<String, Arc<dyn DistanceMetric>> = HashMap::new();
        let manhattan: Arc<dyn DistanceMetric> = Arc::new(Manhattan);
        let euclidean: Arc<dyn DistanceMetric> = Arc::new(Euclidean);
        let chebyshev: Arc<dyn DistanceMetric> = Arc::new(Chebyshev);

        for alias in ["manhattan", "cityblock", "l1"] {
            metrics.insert(alias.to_string(), Arc::clone(&manhattan));
        }
        for alias in ["euclidean", "l2"] {
            metrics.insert(alias.to_string(), Arc::clone(&euclidean));
        }
        for alias in ["chebyshev", "infinity"] {
            metrics.insert(alias.to_string(), Arc::clone(&chebyshev));
        }
        metrics.insert("canberra".to_string(), Arc::new(Canberra));

        Self { metrics }
    }

    /// Register a custom metric under `name`
    ///
    /// The metric is probed on a few fixed vectors; a metric that returns a
    /// negative or non-finite distance, a non-zero self distance, or an
    /// asymmetric result is rejected.
    pub fn register(&mut self, name: &str, metric: Arc<dyn DistanceMetric>) -> Result<()> {
        probe_metric(metric.as_ref())?;
        self.metrics.insert(name.trim().to_lowercase(), metric);
        Ok(())
    }

    /// Resolve a metric by name (case-insensitive)
    ///
    /// `minkowski:<p>` is resolved on the fly for any `p >= 1`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn DistanceMetric>> {
        let key = name.trim().to_lowercase();
        if let Some(metric) = self.metrics.get(&key) {
            return Ok(Arc::clone(metric));
        }
        if let Some(order) = key.strip_prefix("minkowski:") {
            let p: f64 = order.parse().map_err(|_| {
                EngineError::InvalidMetric(format!("cannot parse minkowski order '{}'", order))
            })?;
            return Ok(Arc::new(Minkowski::new(p)?));
        }
        Err(EngineError::InvalidMetric(format!(
            "unknown distance metric '{}'",
            name
        )))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.keys().cloned().collect();
        names.sort();
        names
    }
}

fn probe_metric(metric: &dyn DistanceMetric) -> Result<()> {
    const PROBES: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, -2.0, 3.5], [-4.0, 0.5, 2.0]];
    let invalid = |why: &str| EngineError::InvalidMetric(format!("'{}' {}", metric.name(), why));

    for x in &PROBES {
        if metric.distance(x, x).abs() > 1e-12 {
            return Err(invalid("has a non-zero self distance"));
        }
        for y in &PROBES {
            let dxy = metric.distance(x, y);
            if !dxy.is_finite() || dxy < 0.0 {
                return Err(invalid("produced a negative or non-finite distance"));
            }
            if (dxy - metric.distance(y, x)).abs() > 1e-9 {
                return Err(invalid("is not symmetric"));
            }
        }
    }
    Ok(())
}

/// One entry of a neighbor set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row index of the neighbor
    pub index: usize,
    pub distance: f64,
}

/// Precomputed pairwise distances for one matrix
#[derive(Debug, Clone)]
pub struct DistanceIndex {
    n: usize,
    distances: Vec<f64>,
    ids: Vec<String>,
    metric_name: String,
}

impl DistanceIndex {
    /// Compute all pairwise distances of `matrix` under `metric`
    ///
    /// # Errors
    /// `InvalidMetric` if the metric yields a negative or NaN distance,
    /// `DegenerateInput` if a pair of experiments is too far apart to represent.
    pub fn build(matrix: &MetricMatrix, metric: &dyn DistanceMetric) -> Result<Self> {
        let n = matrix.n_rows();
        let mut distances = vec![0.0; n * n];

        for i in 0..n {
            for j in (i + 1)..n {
                let d = checked_distance(metric, matrix, i, j)?;
                distances[i * n + j] = d;
                distances[j * n + i] = d;
            }
        }

        tracing::debug!(
            experiments = n,
            metric = metric.name(),
            "built pairwise distance index"
        );

        Ok(Self {
            n,
            distances,
            ids: matrix.experiments().to_vec(),
            metric_name: metric.name().to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distances[i * self.n + j]
    }

    /// The `k` nearest experiments to `i`, excluding `i` itself
    ///
    /// Sorted ascending by distance, ties broken by experiment id so the
    /// neighbor set does not depend on where rows sit in the matrix.
    ///
    /// # Errors
    /// `InsufficientData` if `k >= n`, `InvalidConfig` if `k == 0`.
    pub fn neighbors(&self, i: usize, k: usize) -> Result<Vec<Neighbor>> {
        check_neighbor_count(k, self.n)?;
        let row = &self.distances[i * self.n..(i + 1) * self.n];
        Ok(nearest(
            row.iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(index, &distance)| Neighbor { index, distance }),
            &self.ids,
            k,
        ))
    }
}

/// Validate that `k` neighbors can be drawn from `n` experiments
pub(crate) fn check_neighbor_count(k: usize, n: usize) -> Result<()> {
    if k == 0 {
        return Err(EngineError::InvalidConfig(
            "k must be a positive number of neighbors".to_string(),
        ));
    }
    if k >= n {
        return Err(EngineError::InsufficientData { k, available: n });
    }
    Ok(())
}

/// Distance between rows `i` and `j` of `matrix` with the metric contract enforced
///
/// Matrix values are finite, so an infinite distance means the pair overflowed
/// f64 range; that is reported against the input rather than the metric.
pub(crate) fn checked_distance(
    metric: &dyn DistanceMetric,
    matrix: &MetricMatrix,
    i: usize,
    j: usize,
) -> Result<f64> {
    let d = metric.distance(matrix.row(i), matrix.row(j));
    if d == f64::INFINITY {
        return Err(EngineError::DegenerateInput(format!(
            "{} distance between '{}' and '{}' overflows",
            metric.name(),
            matrix.experiments()[i],
            matrix.experiments()[j]
        )));
    }
    if !d.is_finite() || d < 0.0 {
        return Err(EngineError::InvalidMetric(format!(
            "'{}' produced distance {}",
            metric.name(),
            d
        )));
    }
    Ok(d)
}

/// Keep the `k` smallest candidates; equal distances are ordered by experiment id
pub(crate) fn nearest(
    candidates: impl Iterator<Item = Neighbor>,
    ids: &[String],
    k: usize,
) -> Vec<Neighbor> {
    let mut all: Vec<Neighbor> = candidates.collect();
    all.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| ids[a.index].cmp(&ids[b.index]))
    });
    all.truncate(k);
    all
}

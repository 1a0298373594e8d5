//! Metric preprocessing ahead of outlier detection
//!
//! Three steps, in order:
//! 1. drop metrics whose variance is below a floor (uninformative)
//! 2. drop the later metric of every pair correlated above a ceiling (redundant)
//! 3. scale the remaining metrics, robustly (median / IQR) or standard (mean / stddev)
//!
//! Column statistics use trueno::Vector for SIMD-optimized mean, variance and
//! stddev, and aprender's DescriptiveStats for quantiles. Both operate on f32;
//! the scaled matrix stays f64.

use crate::error::{EngineError, Result};
use crate::matrix::MetricMatrix;
use aprender::stats::DescriptiveStats;
use serde::{Deserialize, Serialize};
use trueno::Vector;

/// How metric values are standardized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    /// Center on the median, divide by the interquartile range
    #[default]
    Robust,
    /// Center on the mean, divide by the standard deviation
    Standard,
}

/// Preprocessing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessConfig {
    /// Metrics with a lower (population) variance are removed
    #[serde(default = "default_min_variance")]
    pub min_variance: f64,

    /// Of two metrics with a higher absolute Pearson correlation, the later one is removed
    #[serde(default = "default_min_correlation")]
    pub min_correlation: f64,

    #[serde(default)]
    pub scaling: ScalingMode,
}

fn default_min_variance() -> f64 {
    0.0001
}

fn default_min_correlation() -> f64 {
    0.9
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_variance: default_min_variance(),
            min_correlation: default_min_correlation(),
            scaling: ScalingMode::default(),
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_variance.is_finite() || self.min_variance < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "min_variance must be non-negative, got {}",
                self.min_variance
            )));
        }
        if !(0.0..=1.0).contains(&self.min_correlation) {
            return Err(EngineError::InvalidConfig(format!(
                "min_correlation must be in [0, 1], got {}",
                self.min_correlation
            )));
        }
        Ok(())
    }
}

/// Variance of one input metric and whether it passed the floor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnVariance {
    pub metric: String,
    pub variance: f64,
    pub kept: bool,
}

/// A metric removed because it duplicates an earlier one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub kept: String,
    pub dropped: String,
    pub correlation: f64,
}

/// Preprocessed matrix plus what was removed and why
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub matrix: MetricMatrix,
    pub variances: Vec<ColumnVariance>,
    pub correlated: Vec<CorrelatedPair>,
}

/// Run variance filtering, correlation pruning and scaling
///
/// # Errors
/// `DegenerateInput` when no metric survives filtering or a statistic cannot
/// be computed, `InvalidConfig` for out-of-range parameters.
pub fn preprocess(matrix: &MetricMatrix, config: &PreprocessConfig) -> Result<Preprocessed> {
    config.validate()?;

    let columns: Vec<Vec<f64>> = (0..matrix.n_cols()).map(|j| matrix.column(j)).collect();

    let mut variances = Vec::with_capacity(columns.len());
    let mut kept = Vec::new();
    for (j, column) in columns.iter().enumerate() {
        let variance = column_vector(column).variance().map_err(|e| {
            stat_error("variance", &matrix.metrics()[j], e)
        })? as f64;
        let keep = variance >= config.min_variance;
        if keep {
            kept.push(j);
        }
        variances.push(ColumnVariance {
            metric: matrix.metrics()[j].clone(),
            variance,
            kept: keep,
        });
    }

    let mut correlated = Vec::new();
    let mut dropped = vec![false; kept.len()];
    for a in 0..kept.len() {
        if dropped[a] {
            continue;
        }
        for b in (a + 1)..kept.len() {
            if dropped[b] {
                continue;
            }
            let r = pearson(&columns[kept[a]], &columns[kept[b]]);
            if r.abs() > config.min_correlation {
                dropped[b] = true;
                correlated.push(CorrelatedPair {
                    kept: matrix.metrics()[kept[a]].clone(),
                    dropped: matrix.metrics()[kept[b]].clone(),
                    correlation: r,
                });
            }
        }
    }
    let selected: Vec<usize> = kept
        .iter()
        .zip(&dropped)
        .filter_map(|(&j, &d)| (!d).then_some(j))
        .collect();

    if selected.is_empty() {
        return Err(EngineError::DegenerateInput(format!(
            "no metric has a variance of at least {}",
            config.min_variance
        )));
    }

    let mut transforms = Vec::with_capacity(selected.len());
    for &j in &selected {
        transforms.push(scaling_parameters(
            &columns[j],
            config.scaling,
            &matrix.metrics()[j],
        )?);
    }

    let scaled = matrix
        .select_columns(&selected)
        .map_columns(|j, v| (v - transforms[j].0) / transforms[j].1);

    tracing::info!(
        input_metrics = matrix.n_cols(),
        low_variance = variances.iter().filter(|v| !v.kept).count(),
        correlated = correlated.len(),
        kept_metrics = scaled.n_cols(),
        scaling = ?config.scaling,
        "preprocessed QC metrics"
    );

    Ok(Preprocessed {
        matrix: scaled,
        variances,
        correlated,
    })
}

fn column_vector(column: &[f64]) -> Vector<f32> {
    let values: Vec<f32> = column.iter().map(|&v| v as f32).collect();
    Vector::from_slice(&values)
}

fn stat_error(what: &str, metric: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::DegenerateInput(format!(
        "failed to compute {} of metric '{}': {}",
        what, metric, e
    ))
}

/// (center, scale) for one column; a zero spread scales by 1
fn scaling_parameters(column: &[f64], mode: ScalingMode, metric: &str) -> Result<(f64, f64)> {
    let vector = column_vector(column);
    let (center, spread) = match mode {
        ScalingMode::Robust => {
            let stats = DescriptiveStats::new(&vector);
            let median = stats
                .quantile(0.5)
                .map_err(|e| stat_error("median", metric, e))?;
            let q1 = stats
                .quantile(0.25)
                .map_err(|e| stat_error("first quartile", metric, e))?;
            let q3 = stats
                .quantile(0.75)
                .map_err(|e| stat_error("third quartile", metric, e))?;
            (median as f64, (q3 - q1) as f64)
        }
        ScalingMode::Standard => {
            let mean = vector.mean().map_err(|e| stat_error("mean", metric, e))?;
            let stddev = vector
                .stddev()
                .map_err(|e| stat_error("standard deviation", metric, e))?;
            (mean as f64, stddev as f64)
        }
    };
    let scale = if spread > 0.0 { spread } else { 1.0 };
    Ok((center, scale))
}

/// Pearson correlation; 0 when either column is constant
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(metrics: &[&str], rows: Vec<Vec<f64>>) -> MetricMatrix {
        MetricMatrix::new(
            (0..rows.len()).map(|i| format!("run{}", i)).collect(),
            metrics.iter().map(|m| m.to_string()).collect(),
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = PreprocessConfig::default();
        assert_eq!(config.min_variance, 0.0001);
        assert_eq!(config.min_correlation, 0.9);
        assert_eq!(config.scaling, ScalingMode::Robust);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = PreprocessConfig {
            min_correlation: 1.2,
            ..PreprocessConfig::default()
        };
        assert!(config.validate().is_err());
        let config = PreprocessConfig {
            min_variance: -1.0,
            ..PreprocessConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pearson() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_low_variance_dropped() {
        let m = matrix(
            &["flat", "varied"],
            vec![
                vec![5.0, 1.0],
                vec![5.0, 2.0],
                vec![5.0, 3.0],
                vec![5.0, 4.0],
                vec![5.0, 5.0],
            ],
        );
        let result = preprocess(&m, &PreprocessConfig::default()).unwrap();
        assert_eq!(result.matrix.metrics(), &["varied".to_string()]);
        assert!(!result.variances[0].kept);
        assert!(result.variances[1].kept);
        assert!((result.variances[1].variance - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_correlated_metric_dropped() {
        let m = matrix(
            &["a", "b", "c"],
            vec![
                vec![1.0, 10.0, 3.0],
                vec![2.0, 20.0, 1.0],
                vec![3.0, 30.0, 4.0],
                vec![4.0, 40.0, 1.0],
                vec![5.0, 50.0, 5.0],
            ],
        );
        let result = preprocess(&m, &PreprocessConfig::default()).unwrap();
        assert_eq!(result.matrix.metrics(), &["a".to_string(), "c".to_string()]);
        assert_eq!(result.correlated.len(), 1);
        assert_eq!(result.correlated[0].kept, "a");
        assert_eq!(result.correlated[0].dropped, "b");
        assert!((result.correlated[0].correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_robust_scaling() {
        let m = matrix(
            &["a"],
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]],
        );
        let result = preprocess(&m, &PreprocessConfig::default()).unwrap();
        let scaled = result.matrix.column(0);
        let expected = [-1.0, -0.5, 0.0, 0.5, 1.0];
        for (got, want) in scaled.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "got {} want {}", got, want);
        }
    }

    #[test]
    fn test_standard_scaling() {
        let m = matrix(&["a"], vec![vec![2.0], vec![4.0], vec![6.0], vec![8.0]]);
        let config = PreprocessConfig {
            scaling: ScalingMode::Standard,
            ..PreprocessConfig::default()
        };
        let scaled = preprocess(&m, &config).unwrap().matrix.column(0);
        let mean = scaled.iter().sum::<f64>() / scaled.len() as f64;
        assert!(mean.abs() < 1e-5);
        // population stddev of [2,4,6,8] is sqrt(5)
        assert!((scaled[3] - 3.0 / 5f64.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_nothing_survives() {
        let m = matrix(&["a", "b"], vec![vec![1.0, 2.0], vec![1.0, 2.0]]);
        assert!(matches!(
            preprocess(&m, &PreprocessConfig::default()),
            Err(EngineError::DegenerateInput(_))
        ));
    }
}

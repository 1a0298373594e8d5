//! Partition experiments into inliers and outliers

use crate::error::{EngineError, Result};
use crate::matrix::MetricMatrix;
use crate::scorer::OutlierScores;
use serde::Serialize;

/// An experiment flagged as outlier, with its row in the full matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierRow {
    pub row: usize,
    pub id: String,
    pub score: f64,
}

/// Result of splitting a matrix at a score threshold
#[derive(Debug, Clone)]
pub struct Split {
    /// Matrix without the outlier rows, columns unchanged
    pub inliers: MetricMatrix,
    /// Outliers in matrix row order
    pub outliers: Vec<OutlierRow>,
}

/// Split `matrix` at `threshold`: an experiment is an outlier iff its score is
/// strictly greater than the threshold.
///
/// # Errors
/// `InvalidConfig` if the threshold lies outside `[0, 1]`, `DegenerateInput` if
/// the scores do not belong to this matrix.
pub fn split(matrix: &MetricMatrix, scores: &OutlierScores, threshold: f64) -> Result<Split> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(EngineError::InvalidConfig(format!(
            "outlier threshold must be in [0, 1], got {}",
            threshold
        )));
    }
    if scores.ids() != matrix.experiments() {
        return Err(EngineError::DegenerateInput(
            "scores do not match the matrix experiments".to_string(),
        ));
    }

    let (outlier_rows, inlier_rows): (Vec<usize>, Vec<usize>) =
        (0..matrix.n_rows()).partition(|&i| scores.values()[i] > threshold);

    let outliers = outlier_rows
        .iter()
        .map(|&row| OutlierRow {
            row,
            id: matrix.experiments()[row].clone(),
            score: scores.values()[row],
        })
        .collect();

    tracing::info!(
        threshold,
        inliers = inlier_rows.len(),
        outliers = outlier_rows.len(),
        "split experiments at outlier threshold"
    );

    Ok(Split {
        inliers: matrix.select_rows(&inlier_rows),
        outliers,
    })
}

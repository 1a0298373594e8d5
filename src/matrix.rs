//! Experiment × metric table consumed by the engine
//!
//! Rows are experiments (unique ids), columns are QC metrics (unique names).
//! Values are stored row-major. Missing values must be resolved upstream, so
//! non-finite entries are rejected at construction.

use crate::error::{EngineError, Result};
use serde::Serialize;
use std::collections::HashSet;

/// Numeric QC metric table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMatrix {
    experiments: Vec<String>,
    metrics: Vec<String>,
    values: Vec<f64>,
}

impl MetricMatrix {
    /// Build a matrix from row vectors
    ///
    /// # Errors
    /// `DegenerateInput` when there are no rows or columns, when ids or metric
    /// names repeat, when a row has the wrong width, or when a value is NaN/inf.
    pub fn new(experiments: Vec<String>, metrics: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if metrics.is_empty() {
            return Err(EngineError::DegenerateInput(
                "matrix has zero metric columns".to_string(),
            ));
        }
        if experiments.is_empty() {
            return Err(EngineError::DegenerateInput(
                "matrix has zero experiments".to_string(),
            ));
        }
        if rows.len() != experiments.len() {
            return Err(EngineError::DegenerateInput(format!(
                "{} experiment ids but {} rows",
                experiments.len(),
                rows.len()
            )));
        }
        ensure_unique(&experiments, "experiment id")?;
        ensure_unique(&metrics, "metric name")?;

        let width = metrics.len();
        let mut values = Vec::with_capacity(rows.len() * width);
        for (id, row) in experiments.iter().zip(&rows) {
            if row.len() != width {
                return Err(EngineError::DegenerateInput(format!(
                    "experiment '{}' has {} values, expected {}",
                    id,
                    row.len(),
                    width
                )));
            }
            if let Some(pos) = row.iter().position(|v| !v.is_finite()) {
                return Err(EngineError::DegenerateInput(format!(
                    "experiment '{}' has a missing or non-finite value for metric '{}'",
                    id, metrics[pos]
                )));
            }
            values.extend_from_slice(row);
        }

        Ok(Self {
            experiments,
            metrics,
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.experiments.len()
    }

    pub fn n_cols(&self) -> usize {
        self.metrics.len()
    }

    pub fn experiments(&self) -> &[String] {
        &self.experiments
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Values of experiment `i`
    pub fn row(&self, i: usize) -> &[f64] {
        let width = self.n_cols();
        &self.values[i * width..(i + 1) * width]
    }

    /// Values of metric `j` across all experiments
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.n_rows()).map(|i| self.row(i)[j]).collect()
    }

    pub fn experiment_index(&self, id: &str) -> Option<usize> {
        self.experiments.iter().position(|e| e == id)
    }

    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m == name)
    }

    /// Keep only the given rows, in the given order. May produce an empty matrix.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut values = Vec::with_capacity(rows.len() * self.n_cols());
        for &i in rows {
            values.extend_from_slice(self.row(i));
        }
        Self {
            experiments: rows.iter().map(|&i| self.experiments[i].clone()).collect(),
            metrics: self.metrics.clone(),
            values,
        }
    }

    /// Keep only the given columns, in the given order
    pub fn select_columns(&self, cols: &[usize]) -> Self {
        let mut values = Vec::with_capacity(self.n_rows() * cols.len());
        for i in 0..self.n_rows() {
            let row = self.row(i);
            values.extend(cols.iter().map(|&j| row[j]));
        }
        Self {
            experiments: self.experiments.clone(),
            metrics: cols.iter().map(|&j| self.metrics[j].clone()).collect(),
            values,
        }
    }

    /// Apply `f(column, value)` to every entry, returning a new matrix
    pub(crate) fn map_columns<F>(&self, mut f: F) -> Self
    where
        F: FnMut(usize, f64) -> f64,
    {
        let width = self.n_cols();
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(idx, &v)| f(idx % width, v))
            .collect();
        Self {
            experiments: self.experiments.clone(),
            metrics: self.metrics.clone(),
            values,
        }
    }
}

fn ensure_unique(names: &[String], what: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(EngineError::DegenerateInput(format!(
                "duplicate {} '{}'",
                what, name
            )));
        }
    }
    Ok(())
}

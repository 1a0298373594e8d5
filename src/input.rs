//! Tab-separated QC metric tables
//!
//! Layout: a header row whose first cell labels the experiment column and whose
//! remaining cells name the metrics, then one row per experiment. Every value
//! must be a finite number; missing cells are rejected rather than imputed.

use crate::matrix::MetricMatrix;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Read a metric table from `path`
pub fn read_metrics<P: AsRef<Path>>(path: P) -> Result<MetricMatrix> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read metric table: {}", path.display()))?;
    parse_metrics(&content).with_context(|| format!("Invalid metric table: {}", path.display()))
}

/// Read a metric table from any reader (e.g. stdin)
pub fn read_metrics_from<R: Read>(mut reader: R) -> Result<MetricMatrix> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .context("Failed to read metric table")?;
    parse_metrics(&content)
}

/// Parse tab-separated metric table text
pub fn parse_metrics(content: &str) -> Result<MetricMatrix> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        bail!("metric table is empty");
    };
    let metrics: Vec<String> = header
        .split('\t')
        .skip(1)
        .map(|name| name.trim().to_string())
        .collect();
    if metrics.is_empty() {
        bail!("header has no metric columns");
    }
    if let Some(pos) = metrics.iter().position(|m| m.is_empty()) {
        bail!("header column {} has no metric name", pos + 2);
    }

    let mut experiments = Vec::new();
    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let mut fields = line.split('\t');
        let id = fields.next().unwrap_or_default().trim();
        if id.is_empty() {
            bail!("line {}: missing experiment identifier", line_no);
        }

        let values: Vec<&str> = fields.collect();
        if values.len() != metrics.len() {
            bail!(
                "line {}: expected {} metric values, found {}",
                line_no,
                metrics.len(),
                values.len()
            );
        }

        let row = values
            .iter()
            .zip(&metrics)
            .map(|(raw, metric)| parse_value(raw, metric, line_no))
            .collect::<Result<Vec<f64>>>()?;

        experiments.push(id.to_string());
        rows.push(row);
    }

    tracing::debug!(
        experiments = experiments.len(),
        metrics = metrics.len(),
        "parsed metric table"
    );

    Ok(MetricMatrix::new(experiments, metrics, rows)?)
}

fn parse_value(raw: &str, metric: &str, line_no: usize) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("line {}: missing value for metric '{}'", line_no, metric);
    }
    let value: f64 = raw.parse().with_context(|| {
        format!(
            "line {}: cannot parse '{}' as a number for metric '{}'",
            line_no, raw, metric
        )
    })?;
    if !value.is_finite() {
        bail!(
            "line {}: non-finite value '{}' for metric '{}'",
            line_no,
            raw,
            metric
        );
    }
    Ok(value)
}

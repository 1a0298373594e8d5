//! Analysis results handed to downstream reporting
//!
//! Plain data only: the engine fills these values, the binary decides whether
//! to print them as text or serialize them as JSON.

use crate::explainer::Subspace;
use crate::miner::{FrequentSubspace, MinSupport};
use crate::preprocess::{ColumnVariance, CorrelatedPair, ScalingMode};
use crate::scorer::OutlierScores;
use serde::Serialize;

/// Explanation attached to one flagged experiment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierRecord {
    pub id: String,
    pub score: f64,
    pub subspace: Subspace,
    /// (metric, weight) pairs in metric name order, weights summing to 1
    pub feature_importance: Vec<(String, f64)>,
}

/// What preprocessing removed before detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessSummary {
    pub min_variance: f64,
    pub min_correlation: f64,
    pub scaling: ScalingMode,
    pub variances: Vec<ColumnVariance>,
    pub correlated: Vec<CorrelatedPair>,
}

/// Complete result of one detection and explanation run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Metrics the detection ran on
    pub metrics: Vec<String>,
    pub scores: OutlierScores,
    pub threshold: f64,
    /// `true` when the threshold came from the score histogram
    pub threshold_derived: bool,
    pub num_bins: usize,
    pub inliers: Vec<String>,
    /// Flagged experiments in input order
    pub outliers: Vec<OutlierRecord>,
    pub frequent_subspaces: Vec<FrequentSubspace>,
    pub min_support: MinSupport,
    /// `min_support` resolved against the number of outliers
    pub min_support_count: usize,
    pub min_length: usize,
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocessing: Option<PreprocessSummary>,
}

impl AnalysisReport {
    pub fn outlier(&self, id: &str) -> Option<&OutlierRecord> {
        self.outliers.iter().find(|o| o.id == id)
    }

    pub fn is_outlier(&self, id: &str) -> bool {
        self.outlier(id).is_some()
    }

    /// Format report as a human-readable summary
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str("\n=== QC Outlier Report ===\n");
        output.push_str(&format!("Experiments: {}\n", self.scores.len()));
        output.push_str(&format!("Metrics: {}\n", self.metrics.len()));
        output.push_str(&format!(
            "Neighbors: k={} ({} distance)\n",
            self.scores.k, self.scores.metric
        ));

        if let Some(pre) = &self.preprocessing {
            let removed: Vec<&str> = pre
                .variances
                .iter()
                .filter(|v| !v.kept)
                .map(|v| v.metric.as_str())
                .collect();
            output.push_str(&format!("\nPreprocessing ({:?} scaling):\n", pre.scaling));
            output.push_str(&format!(
                "  Low variance (< {}): {}\n",
                pre.min_variance,
                list_or_none(&removed)
            ));
            output.push_str(&format!("  Correlated (> {}):", pre.min_correlation));
            if pre.correlated.is_empty() {
                output.push_str(" none\n");
            } else {
                output.push('\n');
                for pair in &pre.correlated {
                    output.push_str(&format!(
                        "    - {} (r = {:.3} with {})\n",
                        pair.dropped, pair.correlation, pair.kept
                    ));
                }
            }
        }

        let origin = if self.threshold_derived {
            format!("derived from {}-bin histogram", self.num_bins)
        } else {
            "fixed".to_string()
        };
        output.push_str(&format!(
            "\nOutlier Threshold: {:.3} ({})\n",
            self.threshold, origin
        ));

        if self.outliers.is_empty() {
            output.push_str("\nNo outliers detected.\n");
            return output;
        }

        let mut ranked: Vec<&OutlierRecord> = self.outliers.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        output.push_str(&format!(
            "\nOutliers Detected: {} of {}\n",
            self.outliers.len(),
            self.scores.len()
        ));
        for record in ranked {
            output.push_str(&format!(
                "  - {}: score {:.3}, subspace {{{}}}\n",
                record.id, record.score, record.subspace
            ));
            for (metric, weight) in &record.feature_importance {
                output.push_str(&format!("      {}: {:.3}\n", metric, weight));
            }
        }

        output.push_str(&format!(
            "\nFrequent Subspaces (support >= {}, length >= {}):\n",
            self.min_support_count, self.min_length
        ));
        if self.frequent_subspaces.is_empty() {
            output.push_str("  none\n");
        }
        for frequent in &self.frequent_subspaces {
            output.push_str(&format!(
                "  - {{{}}}: {}\n",
                frequent.subspace, frequent.support
            ));
        }

        output
    }
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> AnalysisReport {
        let ids: Vec<String> = ["e1", "e2", "e3"].iter().map(|s| s.to_string()).collect();
        AnalysisReport {
            metrics: vec!["A".to_string(), "B".to_string()],
            scores: OutlierScores::new(ids, vec![0.0, 0.4, 0.9], 1, "manhattan".to_string()),
            threshold: 0.35,
            threshold_derived: true,
            num_bins: 20,
            inliers: vec!["e1".to_string()],
            outliers: vec![
                OutlierRecord {
                    id: "e2".to_string(),
                    score: 0.4,
                    subspace: ["A", "B"].into_iter().collect(),
                    feature_importance: vec![("A".to_string(), 0.25), ("B".to_string(), 0.75)],
                },
                OutlierRecord {
                    id: "e3".to_string(),
                    score: 0.9,
                    subspace: ["B"].into_iter().collect(),
                    feature_importance: vec![("B".to_string(), 1.0)],
                },
            ],
            frequent_subspaces: vec![FrequentSubspace {
                subspace: ["B"].into_iter().collect(),
                support: 2,
            }],
            min_support: MinSupport::Absolute(2),
            min_support_count: 2,
            min_length: 1,
            max_length: None,
            preprocessing: None,
        }
    }

    #[test]
    fn test_lookup() {
        let r = report();
        assert!(r.is_outlier("e3"));
        assert!(!r.is_outlier("e1"));
        assert_eq!(r.outlier("e2").unwrap().subspace.len(), 2);
    }

    #[test]
    fn test_format_ranks_by_score() {
        let text = report().format();
        assert!(text.contains("=== QC Outlier Report ==="));
        assert!(text.contains("Outlier Threshold: 0.350 (derived from 20-bin histogram)"));
        assert!(text.contains("Outliers Detected: 2 of 3"));
        let e3 = text.find("e3: score 0.900").unwrap();
        let e2 = text.find("e2: score 0.400").unwrap();
        assert!(e3 < e2);
        assert!(text.contains("{A, B}"));
        assert!(text.contains("  - {B}: 2"));
    }

    #[test]
    fn test_format_no_outliers() {
        let mut r = report();
        r.outliers.clear();
        r.threshold_derived = false;
        let text = r.format();
        assert!(text.contains("(fixed)"));
        assert!(text.contains("No outliers detected."));
        assert!(!text.contains("Frequent Subspaces"));
    }

    #[test]
    fn test_format_preprocessing() {
        let mut r = report();
        r.preprocessing = Some(PreprocessSummary {
            min_variance: 0.0001,
            min_correlation: 0.9,
            scaling: ScalingMode::Robust,
            variances: vec![ColumnVariance {
                metric: "flat".to_string(),
                variance: 0.0,
                kept: false,
            }],
            correlated: vec![CorrelatedPair {
                kept: "A".to_string(),
                dropped: "A2".to_string(),
                correlation: 0.99,
            }],
        });
        let text = r.format();
        assert!(text.contains("Low variance (< 0.0001): flat"));
        assert!(text.contains("A2 (r = 0.990 with A)"));
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(report()).unwrap();
        assert_eq!(value["threshold_derived"], true);
        assert_eq!(value["outliers"][1]["subspace"], serde_json::json!(["B"]));
        assert_eq!(value["frequent_subspaces"][0]["support"], 2);
        assert_eq!(value["min_support"], serde_json::json!({ "absolute": 2 }));
        assert!(value.get("preprocessing").is_none());
    }
}

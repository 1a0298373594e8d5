//! Automatic outlier score threshold
//!
//! Scores are binned into `num_bins` equal-width bins over `[0, 1]`. The bulk of
//! the experiments sits around the modal bin; scanning upward from it, the first
//! bin whose count falls under the residual floor `max(1, rarity · n)` marks the
//! start of the tail, and its lower edge is the cutoff. If the bulk reaches the
//! top bin the cutoff is 1.0 (nothing is flagged).

use crate::error::{EngineError, Result};
use serde::Serialize;

/// Default number of histogram bins
pub const DEFAULT_NUM_BINS: usize = 20;

/// Default tail rarity: fewer than one experiment in a hundred
pub const DEFAULT_RARITY: f64 = 0.01;

/// Equal-width score histogram over `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreHistogram {
    pub counts: Vec<usize>,
    pub bin_width: f64,
}

impl ScoreHistogram {
    pub fn new(scores: &[f64], num_bins: usize) -> Result<Self> {
        if num_bins == 0 {
            return Err(EngineError::InvalidConfig(
                "num_bins must be positive".to_string(),
            ));
        }
        let bin_width = 1.0 / num_bins as f64;
        let mut counts = vec![0usize; num_bins];
        for &s in scores {
            // 1.0 belongs to the last bin
            let bin = ((s.clamp(0.0, 1.0) / bin_width) as usize).min(num_bins - 1);
            counts[bin] += 1;
        }
        Ok(Self { counts, bin_width })
    }

    /// Lower boundary of bin `b`
    pub fn lower_edge(&self, b: usize) -> f64 {
        b as f64 * self.bin_width
    }

    /// First bin holding the maximum count
    pub fn mode(&self) -> usize {
        let max = self.counts.iter().copied().max().unwrap_or(0);
        self.counts.iter().position(|&c| c == max).unwrap_or(0)
    }
}

/// Histogram-based threshold estimator
#[derive(Debug, Clone, Copy)]
pub struct ThresholdEstimator {
    num_bins: usize,
    rarity: f64,
}

impl Default for ThresholdEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_BINS)
    }
}

impl ThresholdEstimator {
    pub fn new(num_bins: usize) -> Self {
        Self {
            num_bins,
            rarity: DEFAULT_RARITY,
        }
    }

    pub fn with_rarity(mut self, rarity: f64) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Derive a cutoff in `[0, 1]` from a score distribution
    ///
    /// # Errors
    /// `DegenerateInput` for an empty score list, `InvalidConfig` for zero bins
    /// or a rarity outside `[0, 1]`.
    pub fn estimate(&self, scores: &[f64]) -> Result<f64> {
        if scores.is_empty() {
            return Err(EngineError::DegenerateInput(
                "cannot derive a threshold from zero scores".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rarity) {
            return Err(EngineError::InvalidConfig(format!(
                "tail rarity must be in [0, 1], got {}",
                self.rarity
            )));
        }
        let histogram = ScoreHistogram::new(scores, self.num_bins)?;

        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max - min <= f64::EPSILON {
            let threshold = (max + histogram.bin_width).min(1.0);
            tracing::debug!(threshold, "identical scores, threshold above the only value");
            return Ok(threshold);
        }

        let floor = (self.rarity * scores.len() as f64).max(1.0);
        let mode = histogram.mode();
        let threshold = (mode + 1..self.num_bins)
            .find(|&b| (histogram.counts[b] as f64) < floor)
            .map(|b| histogram.lower_edge(b))
            .unwrap_or(1.0);

        tracing::debug!(
            num_bins = self.num_bins,
            mode_bin = mode,
            floor,
            threshold,
            "derived outlier score threshold"
        );

        Ok(threshold)
    }
}

/// Derive a threshold with the default rarity criterion
pub fn estimate(scores: &[f64], num_bins: usize) -> Result<f64> {
    ThresholdEstimator::new(num_bins).estimate(scores)
}

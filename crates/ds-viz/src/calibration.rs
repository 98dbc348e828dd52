//! Calibration curve artifact: predicted probability vs observed frequency.

use std::path::Path;

use ds_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One probability bin of the calibration curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationBin {
    /// Mean predicted probability of the samples in the bin.
    pub mean_predicted: f64,
    /// Fraction of the bin's samples that are actually positive.
    pub observed_frequency: f64,
    /// Number of samples in the bin.
    pub count: usize,
}

/// Plot-friendly calibration artifact over uniform bins of `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationCurveArtifact {
    /// Requested bin count (empty bins are omitted from `bins`).
    pub n_bins: usize,
    /// Non-empty bins, in probability order.
    pub bins: Vec<CalibrationBin>,
}

impl CalibrationCurveArtifact {
    /// Bin predicted probabilities and compare with observed outcomes.
    pub fn from_scores(y_true: &[u8], scores: &[f64], n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Data("calibration needs at least one bin".to_string()));
        }
        if y_true.len() != scores.len() {
            return Err(Error::Data(format!(
                "{} labels but {} scores",
                y_true.len(),
                scores.len()
            )));
        }
        if y_true.is_empty() {
            return Err(Error::Data("cannot calibrate an empty score set".to_string()));
        }
        if scores.iter().any(|s| !s.is_finite() || !(0.0..=1.0).contains(s)) {
            return Err(Error::Data("scores must be probabilities in [0, 1]".to_string()));
        }

        let mut sums = vec![0.0f64; n_bins];
        let mut positives = vec![0usize; n_bins];
        let mut counts = vec![0usize; n_bins];
        for (&y, &s) in y_true.iter().zip(scores) {
            // score 1.0 falls into the top bin, all other bins are
            // half-open [lo, hi).
            let j = ((s * n_bins as f64) as usize).min(n_bins - 1);
            sums[j] += s;
            positives[j] += y as usize;
            counts[j] += 1;
        }

        let bins = (0..n_bins)
            .filter(|&j| counts[j] > 0)
            .map(|j| CalibrationBin {
                mean_predicted: sums[j] / counts[j] as f64,
                observed_frequency: positives[j] as f64 / counts[j] as f64,
                count: counts[j],
            })
            .collect();

        Ok(Self { n_bins, bins })
    }

    /// Write the artifact as pretty JSON, creating parent directories.
    pub fn write_json_file(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfectly_calibrated_bins_sit_on_the_diagonal() {
        // Bin around 0.25: 1 of 4 positive; bin around 0.75: 3 of 4 positive.
        let scores = vec![0.25, 0.25, 0.25, 0.25, 0.75, 0.75, 0.75, 0.75];
        let y_true = vec![1, 0, 0, 0, 1, 1, 1, 0];
        let artifact = CalibrationCurveArtifact::from_scores(&y_true, &scores, 4).unwrap();
        assert_eq!(artifact.bins.len(), 2);
        assert_relative_eq!(artifact.bins[0].mean_predicted, 0.25);
        assert_relative_eq!(artifact.bins[0].observed_frequency, 0.25);
        assert_relative_eq!(artifact.bins[1].mean_predicted, 0.75);
        assert_relative_eq!(artifact.bins[1].observed_frequency, 0.75);
    }

    #[test]
    fn score_of_one_lands_in_the_top_bin() {
        let artifact = CalibrationCurveArtifact::from_scores(&[1], &[1.0], 10).unwrap();
        assert_eq!(artifact.bins.len(), 1);
        assert_eq!(artifact.bins[0].count, 1);
        assert_relative_eq!(artifact.bins[0].mean_predicted, 1.0);
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        assert!(CalibrationCurveArtifact::from_scores(&[1], &[1.5], 10).is_err());
        assert!(CalibrationCurveArtifact::from_scores(&[1], &[f64::NAN], 10).is_err());
    }

    #[test]
    fn json_round_trip() {
        let artifact =
            CalibrationCurveArtifact::from_scores(&[0, 1, 1], &[0.1, 0.6, 0.9], 10).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viz/calibration.json");
        artifact.write_json_file(&path).unwrap();
        let back: CalibrationCurveArtifact =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.n_bins, 10);
        assert_eq!(back.bins.len(), artifact.bins.len());
    }
}

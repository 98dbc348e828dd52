//! ROC curve artifact with AUC and the Youden-J optimal threshold.

use std::path::Path;

use ds_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Single operating point: predict positive when `score >= threshold`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RocCurvePoint {
    /// Score threshold producing this point.
    pub threshold: f64,
    /// False positive rate at the threshold.
    pub fpr: f64,
    /// True positive rate at the threshold.
    pub tpr: f64,
}

/// Plot-friendly ROC artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurveArtifact {
    /// Operating points at each distinct score, descending threshold. The
    /// implicit `(0, 0)` anchor is not stored but participates in the AUC.
    pub points: Vec<RocCurvePoint>,
    /// Area under the curve (trapezoid rule).
    pub auc: f64,
    /// Threshold maximising Youden's J = tpr - fpr.
    pub optimal_threshold: f64,
    /// J value at the optimal threshold.
    pub optimal_j: f64,
}

impl RocCurveArtifact {
    /// Build the curve from ground-truth labels and positive-class scores.
    pub fn from_scores(y_true: &[u8], scores: &[f64]) -> Result<Self> {
        if y_true.len() != scores.len() {
            return Err(Error::Data(format!(
                "{} labels but {} scores",
                y_true.len(),
                scores.len()
            )));
        }
        if y_true.iter().any(|&y| y > 1) {
            return Err(Error::Data("labels must be 0 or 1".to_string()));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(Error::Data("scores must be finite".to_string()));
        }
        let n_pos = y_true.iter().filter(|&&y| y == 1).count();
        let n_neg = y_true.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(Error::Data(
                "ROC needs at least one positive and one negative label".to_string(),
            ));
        }

        // Walk samples by descending score, emitting one point per distinct
        // threshold so tied scores collapse into a single operating point.
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap());

        let mut points = Vec::new();
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut i = 0usize;
        while i < order.len() {
            let threshold = scores[order[i]];
            while i < order.len() && scores[order[i]] == threshold {
                if y_true[order[i]] == 1 {
                    tp += 1;
                } else {
                    fp += 1;
                }
                i += 1;
            }
            points.push(RocCurvePoint {
                threshold,
                fpr: fp as f64 / n_neg as f64,
                tpr: tp as f64 / n_pos as f64,
            });
        }

        // Trapezoid AUC from the (0, 0) anchor through every point.
        let mut auc = 0.0;
        let (mut prev_fpr, mut prev_tpr) = (0.0f64, 0.0f64);
        for p in &points {
            auc += (p.fpr - prev_fpr) * (p.tpr + prev_tpr) / 2.0;
            prev_fpr = p.fpr;
            prev_tpr = p.tpr;
        }

        let best = points
            .iter()
            .max_by(|a, b| (a.tpr - a.fpr).partial_cmp(&(b.tpr - b.fpr)).unwrap())
            .expect("points is non-empty");
        let (optimal_threshold, optimal_j) = (best.threshold, best.tpr - best.fpr);

        tracing::info!(auc, optimal_threshold, "ROC curve computed");

        Ok(Self { points, auc, optimal_threshold, optimal_j })
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
    fn perfect_separation_has_auc_one() {
        let artifact =
            RocCurveArtifact::from_scores(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_relative_eq!(artifact.auc, 1.0);
        assert_relative_eq!(artifact.optimal_j, 1.0);
        assert_relative_eq!(artifact.optimal_threshold, 0.8);
    }

    #[test]
    fn reversed_scores_have_auc_zero() {
        let artifact =
            RocCurveArtifact::from_scores(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_relative_eq!(artifact.auc, 0.0);
    }

    #[test]
    fn tied_scores_collapse_to_the_chance_diagonal() {
        let artifact = RocCurveArtifact::from_scores(&[0, 1], &[0.5, 0.5]).unwrap();
        assert_eq!(artifact.points.len(), 1);
        assert_relative_eq!(artifact.auc, 0.5);
    }

    #[test]
    fn single_class_labels_are_rejected() {
        assert!(RocCurveArtifact::from_scores(&[1, 1], &[0.4, 0.6]).is_err());
    }

    #[test]
    fn curve_ends_at_the_top_right_corner() {
        let artifact =
            RocCurveArtifact::from_scores(&[0, 1, 0, 1, 1], &[0.2, 0.3, 0.4, 0.7, 0.9]).unwrap();
        let last = artifact.points.last().unwrap();
        assert_relative_eq!(last.fpr, 1.0);
        assert_relative_eq!(last.tpr, 1.0);
    }

    #[test]
    fn json_round_trip() {
        let artifact =
            RocCurveArtifact::from_scores(&[0, 1, 1, 0], &[0.2, 0.9, 0.6, 0.3]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viz/roc.json");
        artifact.write_json_file(&path).unwrap();
        let back: RocCurveArtifact =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.points.len(), artifact.points.len());
        assert_relative_eq!(back.auc, artifact.auc);
    }
}

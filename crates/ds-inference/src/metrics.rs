//! Classification quality metrics for binary labels.

use ds_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// F1/precision/recall for the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScore {
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Score binary predictions against ground truth. Zero denominators (no
/// predicted positives, no actual positives) yield 0 rather than NaN.
pub fn classification_score(y_true: &[u8], y_pred: &[u8]) -> Result<ClassificationScore> {
    if y_true.is_empty() {
        return Err(Error::Data("cannot score an empty label set".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(Error::Data(format!(
            "{} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.iter().chain(y_pred).any(|&v| v > 1) {
        return Err(Error::Data("labels must be 0 or 1".to_string()));
    }

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t, p) {
            (1, 1) => tp += 1,
            (0, 1) => fp += 1,
            (1, 0) => fn_ += 1,
            _ => {}
        }
    }

    let precision = if tp + fp == 0 { 0.0 } else { tp as f64 / (tp + fp) as f64 };
    let recall = if tp + fn_ == 0 { 0.0 } else { tp as f64 / (tp + fn_) as f64 };
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Ok(ClassificationScore { f1, precision, recall })
}

//! Logistic risk model (Bernoulli with logit link).
//!
//! `P(positive | x) = sigmoid(intercept + x · weights)`. The model carries
//! its feature names so consumers can verify the feature-order contract, and
//! it round-trips through JSON for publication and serving.

use std::path::Path;

use ds_core::{Error, Result};
use ds_data::matrix::FeatureMatrix;
use serde::{Deserialize, Serialize};

use crate::math::sigmoid;

/// A fitted logistic classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub weights: Vec<f64>,
}

impl RiskModel {
    pub fn new(feature_names: Vec<String>, intercept: f64, weights: Vec<f64>) -> Result<Self> {
        if feature_names.len() != weights.len() {
            return Err(Error::Config(format!(
                "{} feature names but {} weights",
                feature_names.len(),
                weights.len()
            )));
        }
        if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::Config("model parameters must be finite".to_string()));
        }
        Ok(Self { feature_names, intercept, weights })
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    /// Linear predictor `intercept + x · weights`.
    pub fn decision(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.weights.len() {
            return Err(Error::Data(format!(
                "feature vector has {} values, model expects {}",
                row.len(),
                self.weights.len()
            )));
        }
        Ok(self.intercept + row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>())
    }

    /// Positive-class probability.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        Ok(sigmoid(self.decision(row)?))
    }

    /// Hard 0/1 prediction at the 0.5 boundary.
    pub fn predict(&self, row: &[f64]) -> Result<u8> {
        Ok(u8::from(self.predict_proba(row)? >= 0.5))
    }

    pub fn predict_proba_batch(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        matrix.rows.iter().map(|r| self.predict_proba(r)).collect()
    }

    pub fn predict_batch(&self, matrix: &FeatureMatrix) -> Result<Vec<u8>> {
        matrix.rows.iter().map(|r| self.predict(r)).collect()
    }

    pub fn save_json_file(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn load_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read model {}: {e}", path.display())))?;
        let model: RiskModel = serde_json::from_str(&text)?;
        // Re-validate: a hand-edited artifact must not slip past the
        // constructor checks.
        RiskModel::new(model.feature_names, model.intercept, model.weights)
    }
}

//! IRLS trainer for the logistic risk model.
//!
//! Newton scoring: each iteration solves the weighted normal equations
//! `(X~' W X~) delta = X~' (y - mu)` (X~ carries an intercept column) with an
//! LU decomposition and steps `beta += delta`. Training fails loudly on a
//! singular system or non-finite parameters; after fitting, a score floor
//! and an overfit guard decide whether the model is acceptable at all.

use ds_core::{Error, Result};
use ds_data::matrix::FeatureMatrix;
use ds_data::transform::TransformedBundle;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::math::sigmoid;
use crate::metrics::{classification_score, ClassificationScore};
use crate::model::RiskModel;

/// Trainer knobs. The defaults mirror a small-survey workload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub max_iter: usize,
    /// Convergence threshold on the max absolute parameter step.
    pub tol: f64,
    /// Minimum acceptable F1 on the test split.
    pub expected_f1: f64,
    /// Maximum tolerated |train F1 - test F1| gap.
    pub overfit_tolerance: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self { max_iter: 100, tol: 1e-8, expected_f1: 0.6, overfit_tolerance: 0.1 }
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub model: RiskModel,
    pub converged: bool,
    pub n_iter: usize,
    pub train_score: ClassificationScore,
    pub test_score: ClassificationScore,
}

/// Fits [`RiskModel`]s by maximum likelihood.
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainerConfig,
}

impl ModelTrainer {
    pub fn new() -> Self {
        Self { config: TrainerConfig::default() }
    }

    pub fn with_config(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit the logistic model. Returns the model, whether the parameter
    /// steps converged below tolerance, and the iteration count.
    pub fn fit(&self, features: &FeatureMatrix, labels: &[u8]) -> Result<(RiskModel, bool, usize)> {
        let n = features.n_rows();
        let p = features.n_features();
        if n == 0 || p == 0 {
            return Err(Error::Data("training data must be non-empty".to_string()));
        }
        if labels.len() != n {
            return Err(Error::Data(format!("{n} feature rows but {} labels", labels.len())));
        }
        if labels.iter().any(|&y| y > 1) {
            return Err(Error::Data("labels must be 0 or 1".to_string()));
        }
        for (i, row) in features.rows.iter().enumerate() {
            if row.iter().any(|v| !v.is_finite()) {
                return Err(Error::Data(format!("feature row {i} contains non-finite values")));
            }
        }

        let d = p + 1; // intercept first
        let mut beta = vec![0.0f64; d];
        let mut converged = false;
        let mut n_iter = 0usize;

        for iter in 1..=self.config.max_iter {
            n_iter = iter;

            let mut xtwx = vec![0.0f64; d * d];
            let mut grad = vec![0.0f64; d];
            for (row, &y) in features.rows.iter().zip(labels) {
                let eta =
                    beta[0] + row.iter().zip(&beta[1..]).map(|(x, b)| x * b).sum::<f64>();
                let mu = sigmoid(eta);
                // Keep curvature away from zero where mu saturates.
                let w = (mu * (1.0 - mu)).max(1e-10);
                let r = y as f64 - mu;

                grad[0] += r;
                xtwx[0] += w;
                for a in 0..p {
                    let xa = row[a];
                    grad[1 + a] += r * xa;
                    xtwx[1 + a] += w * xa;
                    xtwx[(1 + a) * d] += w * xa;
                    for b in 0..p {
                        xtwx[(1 + a) * d + (1 + b)] += w * xa * row[b];
                    }
                }
            }

            let a = DMatrix::from_row_slice(d, d, &xtwx);
            let g = DVector::from_vec(grad);
            let delta = a.lu().solve(&g).ok_or_else(|| {
                Error::Computation(
                    "IRLS solve failed (singular weighted normal equations)".to_string(),
                )
            })?;

            let mut max_step = 0.0f64;
            for (b, dv) in beta.iter_mut().zip(delta.iter()) {
                *b += dv;
                max_step = max_step.max(dv.abs());
            }
            if beta.iter().any(|b| !b.is_finite()) {
                return Err(Error::Computation(
                    "IRLS diverged to non-finite parameters".to_string(),
                ));
            }
            if max_step < self.config.tol {
                converged = true;
                break;
            }
        }

        let (intercept, weights) = (beta[0], beta[1..].to_vec());
        let model = RiskModel::new(features.feature_names.clone(), intercept, weights)?;
        Ok((model, converged, n_iter))
    }

    /// Fit on the train bundle and gate the result on test-split quality.
    pub fn train(
        &self,
        train: &TransformedBundle,
        test: &TransformedBundle,
    ) -> Result<TrainingReport> {
        if train.features.feature_names != test.features.feature_names {
            return Err(Error::Config(format!(
                "train/test feature columns disagree: {:?} vs {:?}",
                train.features.feature_names, test.features.feature_names
            )));
        }

        let (model, converged, n_iter) = self.fit(&train.features, &train.labels)?;

        let train_score =
            classification_score(&train.labels, &model.predict_batch(&train.features)?)?;
        let test_score =
            classification_score(&test.labels, &model.predict_batch(&test.features)?)?;

        tracing::info!(
            converged,
            n_iter,
            train_f1 = train_score.f1,
            test_f1 = test_score.f1,
            "model training finished"
        );

        if test_score.f1 < self.config.expected_f1 {
            return Err(Error::Computation(format!(
                "trained model F1 {:.4} on the test split is below the expected {:.4}",
                test_score.f1, self.config.expected_f1
            )));
        }
        let gap = (train_score.f1 - test_score.f1).abs();
        if gap > self.config.overfit_tolerance {
            return Err(Error::Computation(format!(
                "train/test F1 gap {:.4} exceeds the overfit tolerance {:.4}",
                gap, self.config.overfit_tolerance
            )));
        }

        Ok(TrainingReport { model, converged, n_iter, train_score, test_score })
    }
}

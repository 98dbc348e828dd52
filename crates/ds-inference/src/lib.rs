//! # ds-inference
//!
//! The model side of DiaStat: a logistic risk classifier, its IRLS trainer,
//! classification metrics, the questionnaire prediction service and the
//! model registry/publisher.

#![warn(clippy::all)]

/// Numerically stable sigmoid/log1pexp helpers.
pub mod math;

/// The logistic risk model and its JSON persistence.
pub mod model;

/// IRLS trainer with score-floor and overfit guards.
pub mod trainer;

/// Classification quality metrics.
pub mod metrics;

/// Questionnaire → risk assessment service.
pub mod predictor;

/// Model publication and latest-version resolution.
pub mod registry;

pub use metrics::{classification_score, ClassificationScore};
pub use model::RiskModel;
pub use predictor::{Questionnaire, RiskAssessment, RiskPredictor};
pub use registry::{publish_model, ModelRegistry, PublishedModel};
pub use trainer::{ModelTrainer, TrainerConfig, TrainingReport};

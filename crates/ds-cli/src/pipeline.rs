//! Typed pipeline config (YAML) and the sequential batch runner.
//!
//! One YAML file drives ingest → validate → transform → train → evaluate →
//! publish. Every artifact path is explicit — there are no baked-in default
//! locations — and the config is validated once at load time. Any stage
//! error aborts the run; there is no checkpointing and no retry.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use ds_data::dataset::Dataset;
use ds_data::matrix::save_labeled_matrix;
use ds_data::resample::SmoteTomekConfig;
use ds_data::schema::DatasetSchema;
use ds_data::transform::{FeaturePipeline, TransformOptions};
use ds_data::validation::{DatasetValidator, ValidationConfig};
use ds_inference::registry::{publish_model, ModelRegistry};
use ds_inference::trainer::{ModelTrainer, TrainerConfig};
use ds_viz::{CalibrationCurveArtifact, RocCurveArtifact, ScoreSet};

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub data: DataConfig,
    /// Schema YAML path.
    pub schema: PathBuf,
    pub validation: ValidationStageConfig,
    pub transform: TransformStageConfig,
    pub trainer: TrainerStageConfig,
    pub evaluation: EvaluationStageConfig,
    pub publish: PublishStageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Raw survey CSV. When present the runner splits it; when absent the
    /// train/test CSVs must already exist.
    #[serde(default)]
    pub raw_csv: Option<PathBuf>,
    pub train_csv: PathBuf,
    pub test_csv: PathBuf,
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationStageConfig {
    pub drift_report: PathBuf,
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformStageConfig {
    pub train_matrix: PathBuf,
    pub test_matrix: PathBuf,
    pub transform_object: PathBuf,
    #[serde(default)]
    pub resample_test: bool,
    #[serde(default = "default_k_neighbors")]
    pub k_neighbors: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainerStageConfig {
    pub model_out: PathBuf,
    pub report: PathBuf,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tol")]
    pub tol: f64,
    #[serde(default = "default_expected_f1")]
    pub expected_f1: f64,
    #[serde(default = "default_overfit_tolerance")]
    pub overfit_tolerance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationStageConfig {
    pub scores: PathBuf,
    #[serde(default)]
    pub roc: Option<PathBuf>,
    #[serde(default)]
    pub calibration: Option<PathBuf>,
    #[serde(default = "default_calibration_bins")]
    pub calibration_bins: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishStageConfig {
    pub model_file: PathBuf,
    pub saved_model_dir: PathBuf,
    #[serde(default = "default_model_file_name")]
    pub file_name: String,
}

fn default_split_ratio() -> f64 {
    0.8
}
fn default_seed() -> u64 {
    42
}
fn default_drift_threshold() -> f64 {
    0.05
}
fn default_k_neighbors() -> usize {
    5
}
fn default_max_iter() -> usize {
    100
}
fn default_tol() -> f64 {
    1e-8
}
fn default_expected_f1() -> f64 {
    0.6
}
fn default_overfit_tolerance() -> f64 {
    0.1
}
fn default_calibration_bins() -> usize {
    10
}
fn default_model_file_name() -> String {
    "model.json".to_string()
}

fn require_path(path: &Path, what: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        anyhow::bail!("pipeline config: {what} must not be empty");
    }
    Ok(())
}

impl PipelineConfig {
    /// Semantic validation beyond what serde enforces.
    pub fn validate(&self) -> Result<()> {
        require_path(&self.schema, "schema")?;
        require_path(&self.data.train_csv, "data.train_csv")?;
        require_path(&self.data.test_csv, "data.test_csv")?;
        require_path(&self.validation.drift_report, "validation.drift_report")?;
        require_path(&self.transform.train_matrix, "transform.train_matrix")?;
        require_path(&self.transform.test_matrix, "transform.test_matrix")?;
        require_path(&self.transform.transform_object, "transform.transform_object")?;
        require_path(&self.trainer.model_out, "trainer.model_out")?;
        require_path(&self.trainer.report, "trainer.report")?;
        require_path(&self.evaluation.scores, "evaluation.scores")?;
        require_path(&self.publish.model_file, "publish.model_file")?;
        require_path(&self.publish.saved_model_dir, "publish.saved_model_dir")?;

        if !(self.data.split_ratio > 0.0 && self.data.split_ratio < 1.0) {
            anyhow::bail!(
                "pipeline config: data.split_ratio must be in (0, 1), got {}",
                self.data.split_ratio
            );
        }
        if !(self.validation.drift_threshold > 0.0 && self.validation.drift_threshold < 1.0) {
            anyhow::bail!(
                "pipeline config: validation.drift_threshold must be in (0, 1), got {}",
                self.validation.drift_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.trainer.expected_f1) {
            anyhow::bail!(
                "pipeline config: trainer.expected_f1 must be in [0, 1], got {}",
                self.trainer.expected_f1
            );
        }
        Ok(())
    }
}

/// Read and validate a pipeline config.
pub fn read_pipeline_config(path: &Path) -> Result<PipelineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pipeline config {}", path.display()))?;
    let config: PipelineConfig = serde_yaml_ng::from_str(&text)
        .with_context(|| format!("malformed pipeline config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Run every stage in order. A failure anywhere aborts the whole run; the
/// next attempt starts again from the beginning.
pub fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    let schema = DatasetSchema::from_yaml_file(&config.schema)?;

    // -- ingest ------------------------------------------------------------
    if let Some(raw_csv) = &config.data.raw_csv {
        tracing::info!(input = %raw_csv.display(), "stage: ingest");
        let dataset = Dataset::from_csv_path(raw_csv)?;
        let n = dataset.n_rows();
        let n_train = ((n as f64 * config.data.split_ratio).round() as usize).clamp(1, n - 1);
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(config.data.seed);
        indices.shuffle(&mut rng);
        dataset.select_rows(&indices[..n_train])?.write_csv_path(&config.data.train_csv)?;
        dataset.select_rows(&indices[n_train..])?.write_csv_path(&config.data.test_csv)?;
    }

    // -- validate ----------------------------------------------------------
    tracing::info!("stage: validate");
    let validator = DatasetValidator::new(
        schema.clone(),
        ValidationConfig {
            drift_report_path: config.validation.drift_report.clone(),
            drift_threshold: config.validation.drift_threshold,
        },
    );
    let outcome = validator.validate(&config.data.train_csv, &config.data.test_csv)?;
    if !outcome.passed {
        if outcome.reasons.is_empty() {
            anyhow::bail!("dataset validation failed: distribution drift detected");
        }
        anyhow::bail!("dataset validation failed: {}", outcome.reasons.join("; "));
    }

    // -- transform ---------------------------------------------------------
    tracing::info!("stage: transform");
    let target = schema.target_column.clone();
    let pipeline = FeaturePipeline::new(
        schema,
        TransformOptions {
            resample: SmoteTomekConfig {
                k_neighbors: config.transform.k_neighbors,
                seed: config.transform.seed,
            },
            resample_test: config.transform.resample_test,
        },
    );
    let train_ds = Dataset::from_csv_path(&config.data.train_csv)?;
    let test_ds = Dataset::from_csv_path(&config.data.test_csv)?;
    let (train_bundle, test_bundle, fitted) = pipeline.fit_transform(&train_ds, &test_ds)?;
    save_labeled_matrix(
        &config.transform.train_matrix,
        &train_bundle.features,
        &train_bundle.labels,
        &target,
    )?;
    save_labeled_matrix(
        &config.transform.test_matrix,
        &test_bundle.features,
        &test_bundle.labels,
        &target,
    )?;
    fitted.save_json_file(&config.transform.transform_object)?;

    // -- train -------------------------------------------------------------
    tracing::info!("stage: train");
    let trainer = ModelTrainer::with_config(TrainerConfig {
        max_iter: config.trainer.max_iter,
        tol: config.trainer.tol,
        expected_f1: config.trainer.expected_f1,
        overfit_tolerance: config.trainer.overfit_tolerance,
    });
    let report = trainer.train(&train_bundle, &test_bundle)?;
    report.model.save_json_file(&config.trainer.model_out)?;
    if let Some(dir) = config.trainer.report.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config.trainer.report, serde_json::to_string_pretty(&report)?)?;

    // -- evaluate ----------------------------------------------------------
    tracing::info!("stage: evaluate");
    let probabilities = report.model.predict_proba_batch(&test_bundle.features)?;
    let score_set = ScoreSet::new(test_bundle.labels.clone(), probabilities)?;
    score_set.save_json_file(&config.evaluation.scores)?;
    if let Some(roc_path) = &config.evaluation.roc {
        RocCurveArtifact::from_scores(&score_set.y_true, &score_set.scores)?
            .write_json_file(roc_path)?;
    }
    if let Some(cal_path) = &config.evaluation.calibration {
        CalibrationCurveArtifact::from_scores(
            &score_set.y_true,
            &score_set.scores,
            config.evaluation.calibration_bins,
        )?
        .write_json_file(cal_path)?;
    }

    // -- publish -----------------------------------------------------------
    tracing::info!("stage: publish");
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .context("system clock before the epoch")?
        .as_secs();
    let registry = ModelRegistry::new(config.publish.saved_model_dir.clone());
    let saved_model_path = registry.version_path(timestamp, &config.publish.file_name);
    publish_model(&config.trainer.model_out, &config.publish.model_file, &saved_model_path)?;

    tracing::info!(
        test_f1 = report.test_score.f1,
        model = %config.publish.model_file.display(),
        "pipeline finished"
    );
    Ok(())
}

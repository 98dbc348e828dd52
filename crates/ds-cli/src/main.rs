//! DiaStat CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;

use ds_data::dataset::Dataset;
use ds_data::matrix::{load_labeled_matrix, save_labeled_matrix};
use ds_data::resample::SmoteTomekConfig;
use ds_data::schema::DatasetSchema;
use ds_data::transform::{FeaturePipeline, TransformOptions, TransformedBundle};
use ds_data::validation::{DatasetValidator, ValidationConfig};
use ds_inference::metrics::classification_score;
use ds_inference::model::RiskModel;
use ds_inference::registry::{publish_model, ModelRegistry};
use ds_inference::trainer::{ModelTrainer, TrainerConfig};
use ds_viz::{CalibrationCurveArtifact, RocCurveArtifact, ScoreSet};

mod pipeline;

#[derive(Parser)]
#[command(name = "diastat")]
#[command(about = "DiaStat - diabetes-risk training pipeline")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shuffle-split a raw survey CSV into train/test files
    Ingest {
        /// Raw survey CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the train split
        #[arg(long)]
        train_out: PathBuf,

        /// Output path for the test split
        #[arg(long)]
        test_out: PathBuf,

        /// Fraction of rows that go to the train split
        #[arg(long, default_value = "0.8")]
        ratio: f64,

        /// Shuffle seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Validate a train/test pair against the schema (structure + drift)
    Validate {
        /// Train split CSV
        #[arg(long)]
        train: PathBuf,

        /// Test split CSV
        #[arg(long)]
        test: PathBuf,

        /// Schema YAML
        #[arg(long)]
        schema: PathBuf,

        /// Where to write the drift report (YAML)
        #[arg(long)]
        report: PathBuf,

        /// Per-column drift significance threshold
        #[arg(long, default_value = "0.05")]
        threshold: f64,

        /// Output file for the validation outcome (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode, scale and rebalance the validated splits
    Transform {
        /// Train split CSV
        #[arg(long)]
        train: PathBuf,

        /// Test split CSV
        #[arg(long)]
        test: PathBuf,

        /// Schema YAML
        #[arg(long)]
        schema: PathBuf,

        /// Output Parquet for the transformed train split
        #[arg(long)]
        train_out: PathBuf,

        /// Output Parquet for the transformed test split
        #[arg(long)]
        test_out: PathBuf,

        /// Output JSON for the fitted transform
        #[arg(long)]
        transform_out: PathBuf,

        /// Also rebalance the test split (kept for parity with legacy runs)
        #[arg(long)]
        resample_test: bool,

        /// SMOTE neighbourhood size
        #[arg(long, default_value = "5")]
        k_neighbors: usize,

        /// Resampling seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train the logistic risk model on transformed splits
    Train {
        /// Transformed train split (Parquet)
        #[arg(long)]
        train: PathBuf,

        /// Transformed test split (Parquet)
        #[arg(long)]
        test: PathBuf,

        /// Output JSON for the trained model
        #[arg(long)]
        model_out: PathBuf,

        /// Max IRLS iterations
        #[arg(long, default_value = "100")]
        max_iter: usize,

        /// Convergence tolerance on the parameter step
        #[arg(long, default_value = "1e-8")]
        tol: f64,

        /// Minimum acceptable F1 on the test split
        #[arg(long, default_value = "0.6")]
        expected_f1: f64,

        /// Maximum tolerated train/test F1 gap
        #[arg(long, default_value = "0.1")]
        overfit_tolerance: f64,

        /// Output file for the training report (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate a trained model on a transformed split
    Evaluate {
        /// Trained model (JSON)
        #[arg(long)]
        model: PathBuf,

        /// Transformed split to score (Parquet)
        #[arg(long)]
        data: PathBuf,

        /// Persist per-sample scores for the viz commands
        #[arg(long)]
        scores_out: Option<PathBuf>,

        /// Output file for the metrics (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Publish a trained model to the pusher path and the saved-models registry
    Publish {
        /// Trained model (JSON)
        #[arg(long)]
        model: PathBuf,

        /// Pusher destination for the current model
        #[arg(long)]
        model_file_path: PathBuf,

        /// Root of the version-stamped saved-models registry
        #[arg(long)]
        saved_model_dir: PathBuf,

        /// Artifact file name inside the version directory
        #[arg(long, default_value = "model.json")]
        file_name: String,

        /// Output file for the publish record (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the whole pipeline from a YAML config
    Run {
        /// Pipeline config (YAML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Visualization artifacts (plot-friendly JSON)
    Viz {
        #[command(subcommand)]
        command: VizCommands,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum VizCommands {
    /// ROC curve artifact from persisted evaluation scores
    Roc {
        /// Score set written by `evaluate --scores-out`
        #[arg(short, long)]
        scores: PathBuf,

        /// Output file for the artifact (pretty JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Calibration curve artifact from persisted evaluation scores
    Calibration {
        /// Score set written by `evaluate --scores-out`
        #[arg(short, long)]
        scores: PathBuf,

        /// Output file for the artifact (pretty JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Number of probability bins
        #[arg(long, default_value = "10")]
        bins: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Ingest { input, train_out, test_out, ratio, seed } => {
            cmd_ingest(&input, &train_out, &test_out, ratio, seed)
        }
        Commands::Validate { train, test, schema, report, threshold, output } => {
            cmd_validate(&train, &test, &schema, &report, threshold, output.as_ref())
        }
        Commands::Transform {
            train,
            test,
            schema,
            train_out,
            test_out,
            transform_out,
            resample_test,
            k_neighbors,
            seed,
        } => cmd_transform(
            &train,
            &test,
            &schema,
            &train_out,
            &test_out,
            &transform_out,
            resample_test,
            k_neighbors,
            seed,
        ),
        Commands::Train {
            train,
            test,
            model_out,
            max_iter,
            tol,
            expected_f1,
            overfit_tolerance,
            output,
        } => cmd_train(
            &train,
            &test,
            &model_out,
            TrainerConfig { max_iter, tol, expected_f1, overfit_tolerance },
            output.as_ref(),
        ),
        Commands::Evaluate { model, data, scores_out, output } => {
            cmd_evaluate(&model, &data, scores_out.as_ref(), output.as_ref())
        }
        Commands::Publish { model, model_file_path, saved_model_dir, file_name, output } => {
            cmd_publish(&model, &model_file_path, &saved_model_dir, &file_name, output.as_ref())
        }
        Commands::Run { config } => {
            let config = pipeline::read_pipeline_config(&config)?;
            pipeline::run_pipeline(&config)
        }
        Commands::Viz { command } => match command {
            VizCommands::Roc { scores, output } => cmd_viz_roc(&scores, &output),
            VizCommands::Calibration { scores, output, bins } => {
                cmd_viz_calibration(&scores, &output, bins)
            }
        },
        Commands::Version => {
            println!("diastat {}", ds_core::VERSION);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Output helper
// ---------------------------------------------------------------------------

/// Pretty-print a JSON value to `output`, or to stdout when no path given.
pub(crate) fn write_json_output(value: &serde_json::Value, output: Option<&PathBuf>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => println!("{text}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

fn cmd_ingest(
    input: &PathBuf,
    train_out: &PathBuf,
    test_out: &PathBuf,
    ratio: f64,
    seed: u64,
) -> Result<()> {
    if !(ratio > 0.0 && ratio < 1.0) {
        anyhow::bail!("--ratio must be in (0, 1), got {ratio}");
    }
    let dataset = Dataset::from_csv_path(input)?;
    let n = dataset.n_rows();
    let n_train = ((n as f64 * ratio).round() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = dataset.select_rows(&indices[..n_train])?;
    let test = dataset.select_rows(&indices[n_train..])?;
    train.write_csv_path(train_out)?;
    test.write_csv_path(test_out)?;

    tracing::info!(
        total = n,
        train = n_train,
        test = n - n_train,
        "split raw survey data"
    );
    println!("ingested {n} rows: {} train, {} test", n_train, n - n_train);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate(
    train: &PathBuf,
    test: &PathBuf,
    schema_path: &PathBuf,
    report: &PathBuf,
    threshold: f64,
    output: Option<&PathBuf>,
) -> Result<()> {
    let schema = DatasetSchema::from_yaml_file(schema_path)?;
    let validator = DatasetValidator::new(
        schema,
        ValidationConfig { drift_report_path: report.clone(), drift_threshold: threshold },
    );
    let outcome = validator.validate(train, test)?;
    write_json_output(&serde_json::to_value(&outcome)?, output)?;

    if !outcome.passed {
        if outcome.reasons.is_empty() {
            anyhow::bail!("dataset validation failed: distribution drift detected");
        }
        anyhow::bail!("dataset validation failed: {}", outcome.reasons.join("; "));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// transform
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn cmd_transform(
    train: &PathBuf,
    test: &PathBuf,
    schema_path: &PathBuf,
    train_out: &PathBuf,
    test_out: &PathBuf,
    transform_out: &PathBuf,
    resample_test: bool,
    k_neighbors: usize,
    seed: u64,
) -> Result<()> {
    let schema = DatasetSchema::from_yaml_file(schema_path)?;
    let target = schema.target_column.clone();
    let options = TransformOptions {
        resample: SmoteTomekConfig { k_neighbors, seed },
        resample_test,
    };
    let pipeline = FeaturePipeline::new(schema, options);

    let train_ds = Dataset::from_csv_path(train)?;
    let test_ds = Dataset::from_csv_path(test)?;
    let (train_bundle, test_bundle, fitted) = pipeline.fit_transform(&train_ds, &test_ds)?;

    save_labeled_matrix(train_out, &train_bundle.features, &train_bundle.labels, &target)?;
    save_labeled_matrix(test_out, &test_bundle.features, &test_bundle.labels, &target)?;
    fitted.save_json_file(transform_out)?;

    println!(
        "transformed {} train rows and {} test rows over {} features",
        train_bundle.features.n_rows(),
        test_bundle.features.n_rows(),
        fitted.feature_names.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// train
// ---------------------------------------------------------------------------

fn cmd_train(
    train: &PathBuf,
    test: &PathBuf,
    model_out: &PathBuf,
    config: TrainerConfig,
    output: Option<&PathBuf>,
) -> Result<()> {
    let (train_features, train_labels) = load_labeled_matrix(train)?;
    let (test_features, test_labels) = load_labeled_matrix(test)?;
    let train_bundle = TransformedBundle { features: train_features, labels: train_labels };
    let test_bundle = TransformedBundle { features: test_features, labels: test_labels };

    let trainer = ModelTrainer::with_config(config);
    let report = trainer.train(&train_bundle, &test_bundle)?;
    report.model.save_json_file(model_out)?;

    write_json_output(&serde_json::to_value(&report)?, output)
}

// ---------------------------------------------------------------------------
// evaluate
// ---------------------------------------------------------------------------

fn cmd_evaluate(
    model_path: &PathBuf,
    data: &PathBuf,
    scores_out: Option<&PathBuf>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let model = RiskModel::load_json_file(model_path)?;
    let (features, labels) = load_labeled_matrix(data)?;

    let probabilities = model.predict_proba_batch(&features)?;
    let predictions: Vec<u8> = probabilities.iter().map(|&p| u8::from(p >= 0.5)).collect();
    let score = classification_score(&labels, &predictions)?;

    if let Some(path) = scores_out {
        ScoreSet::new(labels.clone(), probabilities)?.save_json_file(path)?;
    }

    write_json_output(
        &serde_json::json!({
            "n_samples": labels.len(),
            "f1": score.f1,
            "precision": score.precision,
            "recall": score.recall,
        }),
        output,
    )
}

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

fn cmd_publish(
    model: &PathBuf,
    model_file_path: &PathBuf,
    saved_model_dir: &PathBuf,
    file_name: &str,
    output: Option<&PathBuf>,
) -> Result<()> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .context("system clock before the epoch")?
        .as_secs();
    let registry = ModelRegistry::new(saved_model_dir.clone());
    let saved_model_path = registry.version_path(timestamp, file_name);

    let record = publish_model(model, model_file_path, &saved_model_path)?;
    write_json_output(&serde_json::to_value(&record)?, output)
}

// ---------------------------------------------------------------------------
// viz
// ---------------------------------------------------------------------------

fn cmd_viz_roc(scores: &PathBuf, output: &PathBuf) -> Result<()> {
    let set = ScoreSet::load_json_file(scores)?;
    let artifact = RocCurveArtifact::from_scores(&set.y_true, &set.scores)?;
    artifact.write_json_file(output)?;
    println!("wrote ROC artifact ({} points, AUC {:.4})", artifact.points.len(), artifact.auc);
    Ok(())
}

fn cmd_viz_calibration(scores: &PathBuf, output: &PathBuf, bins: usize) -> Result<()> {
    let set = ScoreSet::load_json_file(scores)?;
    let artifact = CalibrationCurveArtifact::from_scores(&set.y_true, &set.scores, bins)?;
    artifact.write_json_file(output)?;
    println!("wrote calibration artifact ({} non-empty bins)", artifact.bins.len());
    Ok(())
}

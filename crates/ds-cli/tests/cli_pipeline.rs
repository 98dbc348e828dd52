use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use ds_inference::predictor::{Questionnaire, RiskPredictor};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_diastat"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("diastat_cli_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

const SURVEY_HEADER: &str = "Age,Gender,Polyuria,Polydipsia,sudden weight loss,weakness,\
Polyphagia,Genital thrush,visual blurring,Itching,Irritability,delayed healing,\
partial paresis,muscle stiffness,Alopecia,Obesity,class";

/// Deterministic pseudo-random survey flag: distinct prime stride per column
/// so no two columns repeat each other's pattern.
fn flag(i: usize, k: usize) -> bool {
    const STRIDES: [usize; 15] = [3, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59];
    (i * STRIDES[k]) % 100 < 44
}

/// Synthetic survey rows: the label follows the first four symptom flags
/// with occasional contradictions, so a linear model can learn it but the
/// data is not separable.
fn survey_csv(n: usize) -> String {
    let mut out = String::from(SURVEY_HEADER);
    out.push('\n');
    for i in 0..n {
        let age = 25 + (i * 7) % 35;
        let gender = if flag(i, 0) { "Male" } else { "Female" };
        let yes_no = |b: bool| if b { "Yes" } else { "No" };

        let risk = 2 * flag(i, 1) as i32
            + 2 * flag(i, 2) as i32
            + flag(i, 3) as i32
            + flag(i, 4) as i32;
        let mut positive = risk >= 3;
        if i % 13 == 0 {
            positive = !positive;
        }

        out.push_str(&format!(
            "{age},{gender},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            yes_no(flag(i, 1)),
            yes_no(flag(i, 2)),
            yes_no(flag(i, 3)),
            yes_no(flag(i, 4)),
            yes_no(flag(i, 5)),
            yes_no(flag(i, 6)),
            yes_no(flag(i, 7)),
            yes_no(flag(i, 8)),
            yes_no(flag(i, 9)),
            yes_no(flag(i, 10)),
            yes_no(flag(i, 11)),
            yes_no(flag(i, 12)),
            yes_no(flag(i, 13)),
            yes_no(flag(i, 14)),
            if positive { "Positive" } else { "Negative" },
        ));
    }
    out
}

fn schema_yaml() -> &'static str {
    r#"columns:
  - Age
  - Gender
  - Polyuria
  - Polydipsia
  - sudden weight loss
  - weakness
  - Polyphagia
  - Genital thrush
  - visual blurring
  - Itching
  - Irritability
  - delayed healing
  - partial paresis
  - muscle stiffness
  - Alopecia
  - Obesity
  - class
numerical_columns:
  - Age
categorical_columns:
  - Gender
  - Polyuria
  - Polydipsia
  - sudden weight loss
  - weakness
  - Polyphagia
  - Genital thrush
  - visual blurring
  - Itching
  - Irritability
  - delayed healing
  - partial paresis
  - muscle stiffness
  - Alopecia
  - Obesity
  - class
target_column: class
"#
}

#[test]
fn version_prints_the_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("diastat"));
}

#[test]
fn ingest_splits_by_ratio() {
    let dir = tmp_dir("ingest");
    let raw = dir.join("survey.csv");
    std::fs::write(&raw, survey_csv(100)).unwrap();
    let train = dir.join("train.csv");
    let test = dir.join("test.csv");

    let out = run(&[
        "ingest",
        "--input",
        raw.to_str().unwrap(),
        "--train-out",
        train.to_str().unwrap(),
        "--test-out",
        test.to_str().unwrap(),
        "--ratio",
        "0.8",
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let count_rows = |p: &PathBuf| std::fs::read_to_string(p).unwrap().lines().count() - 1;
    assert_eq!(count_rows(&train), 80);
    assert_eq!(count_rows(&test), 20);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn validate_passes_on_identically_distributed_splits() {
    let dir = tmp_dir("validate_ok");
    let train = dir.join("train.csv");
    let test = dir.join("test.csv");
    std::fs::write(&train, survey_csv(120)).unwrap();
    std::fs::write(&test, survey_csv(120)).unwrap();
    let schema = dir.join("schema.yaml");
    std::fs::write(&schema, schema_yaml()).unwrap();
    let report = dir.join("reports/drift.yaml");
    let outcome = dir.join("outcome.json");

    let out = run(&[
        "validate",
        "--train",
        train.to_str().unwrap(),
        "--test",
        test.to_str().unwrap(),
        "--schema",
        schema.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
        "--output",
        outcome.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(report.exists(), "drift report must be written");

    let outcome_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outcome).unwrap()).unwrap();
    assert_eq!(outcome_json["passed"], true);
    let drift_columns = outcome_json["drift"]["columns"].as_object().unwrap();
    assert_eq!(drift_columns.len(), 17);
    for (_, col) in drift_columns {
        assert_eq!(col["drift_status"], false);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn validate_fails_when_a_numerical_column_is_missing() {
    let dir = tmp_dir("validate_missing");
    // Drop the Age column from both splits.
    let full = survey_csv(60);
    let without_age: String = full
        .lines()
        .map(|line| {
            let (_, rest) = line.split_once(',').unwrap();
            format!("{rest}\n")
        })
        .collect();
    let train = dir.join("train.csv");
    let test = dir.join("test.csv");
    std::fs::write(&train, &without_age).unwrap();
    std::fs::write(&test, &without_age).unwrap();
    let schema = dir.join("schema.yaml");
    std::fs::write(&schema, schema_yaml()).unwrap();
    let report = dir.join("drift.yaml");

    let out = run(&[
        "validate",
        "--train",
        train.to_str().unwrap(),
        "--test",
        test.to_str().unwrap(),
        "--schema",
        schema.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
    ]);
    assert!(!out.status.success(), "validation should fail on a missing column");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("numerical"), "stderr={stderr}");
    // Fail-fast: structural failure means no drift report.
    assert!(!report.exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn full_pipeline_produces_serving_ready_artifacts() {
    let dir = tmp_dir("run");
    std::fs::write(dir.join("train.csv"), survey_csv(300)).unwrap();
    std::fs::write(dir.join("test.csv"), survey_csv(300)).unwrap();
    std::fs::write(dir.join("schema.yaml"), schema_yaml()).unwrap();

    let config = format!(
        r#"data:
  train_csv: {dir}/train.csv
  test_csv: {dir}/test.csv
schema: {dir}/schema.yaml
validation:
  drift_report: {dir}/artifacts/drift.yaml
transform:
  train_matrix: {dir}/artifacts/train.parquet
  test_matrix: {dir}/artifacts/test.parquet
  transform_object: {dir}/artifacts/transform.json
trainer:
  model_out: {dir}/artifacts/model.json
  report: {dir}/artifacts/training_report.json
  overfit_tolerance: 0.2
evaluation:
  scores: {dir}/artifacts/scores.json
  roc: {dir}/artifacts/roc.json
  calibration: {dir}/artifacts/calibration.json
publish:
  model_file: {dir}/pusher/model.json
  saved_model_dir: {dir}/saved_models
"#,
        dir = dir.display()
    );
    let config_path = dir.join("pipeline.yaml");
    std::fs::write(&config_path, config).unwrap();

    let out = run(&["run", "--config", config_path.to_str().unwrap()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    for artifact in [
        "artifacts/drift.yaml",
        "artifacts/train.parquet",
        "artifacts/test.parquet",
        "artifacts/transform.json",
        "artifacts/model.json",
        "artifacts/training_report.json",
        "artifacts/scores.json",
        "artifacts/roc.json",
        "artifacts/calibration.json",
        "pusher/model.json",
    ] {
        assert!(dir.join(artifact).exists(), "missing artifact {artifact}");
    }
    let versions: Vec<_> = std::fs::read_dir(dir.join("saved_models")).unwrap().collect();
    assert_eq!(versions.len(), 1, "exactly one published version expected");

    // The published artifacts must satisfy the questionnaire feature-order
    // contract and serve predictions end to end.
    let predictor = RiskPredictor::from_artifact_files(
        &dir.join("artifacts/transform.json"),
        &dir.join("pusher/model.json"),
    )
    .expect("serving artifacts must satisfy the feature-order contract");
    let assessment = predictor
        .assess(&Questionnaire {
            age: 50,
            sex: 1,
            polyuria: 1,
            polydipsia: 1,
            sudden_weight_loss: 1,
            weakness: 1,
            polyphagia: 0,
            genital_thrush: 0,
            visual_blurring: 0,
            itching: 0,
            irritability: 0,
            delayed_healing: 0,
            partial_paresis: 0,
            muscle_stiffness: 0,
            alopecia: 0,
            obesity: 0,
        })
        .unwrap();
    assert!((0.0..=1.0).contains(&assessment.probability));
    assert_eq!(assessment.status, u8::from(assessment.probability >= 0.5));

    // The persisted scores feed the viz commands.
    let roc_out = dir.join("artifacts/roc2.json");
    let out = run(&[
        "viz",
        "roc",
        "--scores",
        dir.join("artifacts/scores.json").to_str().unwrap(),
        "--output",
        roc_out.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let roc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&roc_out).unwrap()).unwrap();
    let auc = roc["auc"].as_f64().unwrap();
    assert!(auc > 0.8, "model should separate the synthetic classes, auc={auc}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn training_report_gates_on_the_score_floor() {
    let dir = tmp_dir("floor");
    std::fs::write(dir.join("train.csv"), survey_csv(200)).unwrap();
    std::fs::write(dir.join("test.csv"), survey_csv(200)).unwrap();
    std::fs::write(dir.join("schema.yaml"), schema_yaml()).unwrap();

    // Transform via the CLI, then train with an unreachable score floor.
    let out = run(&[
        "transform",
        "--train",
        dir.join("train.csv").to_str().unwrap(),
        "--test",
        dir.join("test.csv").to_str().unwrap(),
        "--schema",
        dir.join("schema.yaml").to_str().unwrap(),
        "--train-out",
        dir.join("train.parquet").to_str().unwrap(),
        "--test-out",
        dir.join("test.parquet").to_str().unwrap(),
        "--transform-out",
        dir.join("transform.json").to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let out = run(&[
        "train",
        "--train",
        dir.join("train.parquet").to_str().unwrap(),
        "--test",
        dir.join("test.parquet").to_str().unwrap(),
        "--model-out",
        dir.join("model.json").to_str().unwrap(),
        "--expected-f1",
        "0.999",
    ]);
    assert!(!out.status.success(), "an unreachable score floor must fail training");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("expected"), "stderr={stderr}");

    let _ = std::fs::remove_dir_all(&dir);
}

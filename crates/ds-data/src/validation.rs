//! Structural dataset validation against the declarative schema.
//!
//! Column-count and column-presence checks run first for both splits,
//! accumulating one distinct reason per failed check. If anything structural
//! failed, validation stops there (fail fast); drift detection only runs on
//! structurally sound splits, and its report is always written when computed.

use std::path::{Path, PathBuf};

use ds_core::Result;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::drift::{detect_drift, DriftReport, DEFAULT_DRIFT_THRESHOLD};
use crate::schema::DatasetSchema;

/// Where the drift report goes and how strict the drift test is.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub drift_report_path: PathBuf,
    pub drift_threshold: f64,
}

impl ValidationConfig {
    pub fn new(drift_report_path: PathBuf) -> Self {
        Self { drift_report_path, drift_threshold: DEFAULT_DRIFT_THRESHOLD }
    }
}

/// Outcome of one validation run. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    /// Structural failure reasons, in check order. Empty when the structure
    /// was sound.
    pub reasons: Vec<String>,
    /// Present only when the structural checks passed.
    pub drift: Option<DriftReport>,
    pub valid_train_path: PathBuf,
    pub valid_test_path: PathBuf,
    pub drift_report_path: PathBuf,
}

/// Validates train/test splits against a [`DatasetSchema`].
pub struct DatasetValidator {
    schema: DatasetSchema,
    config: ValidationConfig,
}

impl DatasetValidator {
    pub fn new(schema: DatasetSchema, config: ValidationConfig) -> Self {
        Self { schema, config }
    }

    fn check_column_count(&self, ds: &Dataset, split: &str, reasons: &mut Vec<String>) {
        let expected = self.schema.n_columns();
        let got = ds.n_columns();
        tracing::info!(split, expected, got, "column count check");
        if got != expected {
            reasons.push(format!("{split} dataset has {got} columns, schema requires {expected}"));
        }
    }

    fn check_presence(
        &self,
        ds: &Dataset,
        split: &str,
        kind: &str,
        required: &[String],
        reasons: &mut Vec<String>,
    ) {
        let missing: Vec<&str> = required
            .iter()
            .filter(|name| !ds.has_column(name))
            .map(|name| name.as_str())
            .collect();
        if !missing.is_empty() {
            reasons.push(format!(
                "{split} dataset is missing {kind} columns: {}",
                missing.join(", ")
            ));
        }
    }

    /// Validate a train/test pair of CSV files.
    pub fn validate(&self, train_path: &Path, test_path: &Path) -> Result<ValidationOutcome> {
        let train = Dataset::from_csv_path(train_path)?;
        let test = Dataset::from_csv_path(test_path)?;

        let mut reasons = Vec::new();
        self.check_column_count(&train, "train", &mut reasons);
        self.check_column_count(&test, "test", &mut reasons);
        for (ds, split) in [(&train, "train"), (&test, "test")] {
            self.check_presence(ds, split, "numerical", &self.schema.numerical_columns, &mut reasons);
        }
        for (ds, split) in [(&train, "train"), (&test, "test")] {
            self.check_presence(ds, split, "categorical", &self.schema.categorical_columns, &mut reasons);
        }

        if !reasons.is_empty() {
            tracing::warn!(?reasons, "structural validation failed; skipping drift detection");
            return Ok(ValidationOutcome {
                passed: false,
                reasons,
                drift: None,
                valid_train_path: train_path.to_path_buf(),
                valid_test_path: test_path.to_path_buf(),
                drift_report_path: self.config.drift_report_path.clone(),
            });
        }

        let report = detect_drift(&train, &test, self.config.drift_threshold)?;
        report.write_yaml_file(&self.config.drift_report_path)?;
        tracing::info!(
            passed = report.passed,
            drifted = report.drifted_columns().len(),
            report = %self.config.drift_report_path.display(),
            "drift detection complete"
        );

        Ok(ValidationOutcome {
            passed: report.passed,
            reasons,
            drift: Some(report),
            valid_train_path: train_path.to_path_buf(),
            valid_test_path: test_path.to_path_buf(),
            drift_report_path: self.config.drift_report_path.clone(),
        })
    }
}

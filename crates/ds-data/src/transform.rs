//! Feature encoding, scaling and target mapping.
//!
//! Every fitted piece of state (category code tables, scaler moments) is
//! learned from the training split only and reused verbatim on the test
//! split and at prediction time. The fitted transform round-trips through
//! JSON so the serving side can reload exactly what training produced.

use std::path::Path;

use ds_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::matrix::FeatureMatrix;
use crate::resample::{smote_tomek, SmoteTomekConfig};
use crate::schema::DatasetSchema;

/// Target value mapped to 0.
pub const TARGET_NEGATIVE: &str = "Negative";
/// Target value mapped to 1.
pub const TARGET_POSITIVE: &str = "Positive";

/// Map raw target cells through the fixed two-entry mapping. Any other value
/// is a loud data error — never a silent null.
pub fn map_target(values: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        match v.as_str() {
            TARGET_NEGATIVE => out.push(0),
            TARGET_POSITIVE => out.push(1),
            other => {
                return Err(Error::Data(format!(
                    "target row {}: unmapped value '{other}' (expected '{TARGET_NEGATIVE}' or '{TARGET_POSITIVE}')",
                    i + 1
                )))
            }
        }
    }
    Ok(out)
}

/// Per-column categorical encoder: sorted unique training values become
/// codes `0..n`. Fit once on train, reused (never refit) everywhere else;
/// a value absent from the fit vocabulary is a data error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub column: String,
    categories: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit(column: &str, values: &[String]) -> Self {
        let mut categories: Vec<String> = values.to_vec();
        categories.sort_unstable();
        categories.dedup();
        Self { column: column.to_string(), categories }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn encode(&self, value: &str) -> Result<f64> {
        match self.categories.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(code) => Ok(code as f64),
            Err(_) => Err(Error::Data(format!(
                "column '{}': category '{value}' was not seen during fitting (known: {})",
                self.column,
                self.categories.join(", ")
            ))),
        }
    }

    fn encode_all(&self, values: &[String]) -> Result<Vec<f64>> {
        values.iter().map(|v| self.encode(v)).collect()
    }
}

/// Zero-mean/unit-variance scaling, moments learned from the training split.
/// Constant columns scale by 1 so they map to zero instead of dividing by
/// zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(matrix: &FeatureMatrix) -> Result<Self> {
        let n = matrix.n_rows();
        if n == 0 {
            return Err(Error::Data("cannot fit a scaler on an empty matrix".to_string()));
        }
        let p = matrix.n_features();
        let mut means = vec![0.0; p];
        for row in &matrix.rows {
            for (j, v) in row.iter().enumerate() {
                means[j] += v;
            }
        }
        for m in &mut means {
            *m /= n as f64;
        }
        let mut scales = vec![0.0; p];
        for row in &matrix.rows {
            for (j, v) in row.iter().enumerate() {
                let d = v - means[j];
                scales[j] += d * d;
            }
        }
        for s in &mut scales {
            *s = (*s / n as f64).sqrt();
            if *s == 0.0 {
                *s = 1.0;
            }
        }
        Ok(Self { means, scales })
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.means.len() {
            return Err(Error::Data(format!(
                "row has {} values, scaler was fitted on {}",
                row.len(),
                self.means.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        let rows = matrix
            .rows
            .iter()
            .map(|r| self.transform_row(r))
            .collect::<Result<Vec<_>>>()?;
        FeatureMatrix::new(matrix.feature_names.clone(), rows)
    }
}

/// Everything the serving side needs to reproduce the training-time
/// transform: the feature order, the per-column code tables and the scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    pub feature_names: Vec<String>,
    pub encoders: Vec<CategoryEncoder>,
    pub scaler: StandardScaler,
}

impl FittedTransform {
    /// Scale an already numeric feature vector (e.g. an integer-coded
    /// questionnaire) with the training-time moments.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.feature_names.len() {
            return Err(Error::Data(format!(
                "feature vector has {} values, transform expects {}",
                row.len(),
                self.feature_names.len()
            )));
        }
        self.scaler.transform_row(row)
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
            .map_err(|e| Error::Config(format!("failed to read transform {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Options for the transform stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformOptions {
    pub resample: SmoteTomekConfig,
    /// Also rebalance the test split. Off by default: resampling the
    /// evaluation split alters the evaluation distribution; the switch
    /// exists only for parity with systems that did exactly that.
    pub resample_test: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self { resample: SmoteTomekConfig::default(), resample_test: false }
    }
}

/// A transformed split: features plus aligned labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedBundle {
    pub features: FeatureMatrix,
    pub labels: Vec<u8>,
}

impl TransformedBundle {
    fn new(features: FeatureMatrix, labels: Vec<u8>) -> Result<Self> {
        if features.n_rows() != labels.len() {
            return Err(Error::Data(format!(
                "bundle has {} feature rows but {} labels",
                features.n_rows(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }
}

/// Fits the full encoding/scaling/rebalancing pipeline on a train split and
/// applies it to both splits.
pub struct FeaturePipeline {
    schema: DatasetSchema,
    options: TransformOptions,
}

impl FeaturePipeline {
    pub fn new(schema: DatasetSchema, options: TransformOptions) -> Self {
        Self { schema, options }
    }

    /// Encode one dataset's feature columns with the given (already fitted)
    /// encoders, in schema feature order.
    fn encode_features(
        &self,
        ds: &Dataset,
        encoders: &[CategoryEncoder],
    ) -> Result<FeatureMatrix> {
        let feature_names: Vec<String> =
            self.schema.feature_columns().iter().map(|s| s.to_string()).collect();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(feature_names.len());
        for name in &feature_names {
            if self.schema.is_categorical(name) {
                let encoder = encoders
                    .iter()
                    .find(|e| &e.column == name)
                    .ok_or_else(|| Error::Config(format!("no fitted encoder for column '{name}'")))?;
                columns.push(encoder.encode_all(ds.column(name)?)?);
            } else {
                columns.push(ds.numeric_column(name)?);
            }
        }
        let n_rows = ds.n_rows();
        let mut rows = vec![Vec::with_capacity(columns.len()); n_rows];
        for col in &columns {
            for (i, v) in col.iter().enumerate() {
                rows[i].push(*v);
            }
        }
        FeatureMatrix::new(feature_names, rows)
    }

    /// Fit on train, transform train and test, rebalance, and return both
    /// bundles plus the fitted transform.
    pub fn fit_transform(
        &self,
        train: &Dataset,
        test: &Dataset,
    ) -> Result<(TransformedBundle, TransformedBundle, FittedTransform)> {
        let y_train = map_target(train.column(&self.schema.target_column)?)?;
        let y_test = map_target(test.column(&self.schema.target_column)?)?;

        // Encoders are fitted on the training split only.
        let mut encoders = Vec::new();
        for name in self.schema.feature_columns() {
            if self.schema.is_categorical(name) {
                encoders.push(CategoryEncoder::fit(name, train.column(name)?));
            }
        }

        let train_raw = self.encode_features(train, &encoders)?;
        let test_raw = self.encode_features(test, &encoders)?;

        let scaler = StandardScaler::fit(&train_raw)?;
        let train_scaled = scaler.transform(&train_raw)?;
        let test_scaled = scaler.transform(&test_raw)?;

        let (train_features, train_labels) =
            smote_tomek(&train_scaled, &y_train, &self.options.resample)?;
        let (test_features, test_labels) = if self.options.resample_test {
            smote_tomek(&test_scaled, &y_test, &self.options.resample)?
        } else {
            (test_scaled, y_test)
        };

        let transform = FittedTransform {
            feature_names: train_features.feature_names.clone(),
            encoders,
            scaler,
        };

        Ok((
            TransformedBundle::new(train_features, train_labels)?,
            TransformedBundle::new(test_features, test_labels)?,
            transform,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn target_mapping_is_fixed_and_loud() {
        let ok = map_target(&["Positive".into(), "Negative".into()]).unwrap();
        assert_eq!(ok, vec![1, 0]);
        let err = map_target(&["Positive".into(), "maybe".into()]).unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn encoder_codes_are_sorted_unique_training_values() {
        let enc =
            CategoryEncoder::fit("Polyuria", &["Yes".into(), "No".into(), "No".into()]);
        assert_eq!(enc.categories(), &["No", "Yes"]);
        assert_eq!(enc.encode("No").unwrap(), 0.0);
        assert_eq!(enc.encode("Yes").unwrap(), 1.0);
    }

    #[test]
    fn unseen_category_fails_loudly() {
        let enc = CategoryEncoder::fit("Gender", &["Male".into(), "Female".into()]);
        let err = enc.encode("Other").unwrap_err();
        assert!(err.to_string().contains("Other"));
    }

    #[test]
    fn scaler_uses_train_moments_on_disjoint_test_values() {
        let train = FeatureMatrix::new(
            vec!["Age".into()],
            vec![vec![10.0], vec![20.0], vec![30.0], vec![40.0]],
        )
        .unwrap();
        let scaler = StandardScaler::fit(&train).unwrap();
        // mean 25, population std sqrt(125)
        assert_relative_eq!(scaler.means[0], 25.0);
        assert_relative_eq!(scaler.scales[0], 125.0_f64.sqrt());

        // Values disjoint from train must still scale with train moments.
        let out = scaler.transform_row(&[100.0]).unwrap();
        assert_relative_eq!(out[0], (100.0 - 25.0) / 125.0_f64.sqrt());
    }

    #[test]
    fn constant_column_scales_to_zero() {
        let train =
            FeatureMatrix::new(vec!["flag".into()], vec![vec![1.0], vec![1.0]]).unwrap();
        let scaler = StandardScaler::fit(&train).unwrap();
        assert_eq!(scaler.scales[0], 1.0);
        assert_eq!(scaler.transform_row(&[1.0]).unwrap()[0], 0.0);
    }

    fn schema() -> DatasetSchema {
        DatasetSchema {
            columns: vec!["Age".into(), "Gender".into(), "Polyuria".into(), "class".into()],
            numerical_columns: vec!["Age".into()],
            categorical_columns: vec!["Gender".into(), "Polyuria".into()],
            target_column: "class".into(),
        }
    }

    fn survey(n: usize) -> Dataset {
        let mut age = Vec::new();
        let mut gender = Vec::new();
        let mut polyuria = Vec::new();
        let mut class = Vec::new();
        for i in 0..n {
            // A third of the rows are positive, loosely tied to Polyuria.
            let positive = i % 3 == 0;
            age.push((25 + (i * 7) % 35).to_string());
            gender.push(if i % 2 == 0 { "Male" } else { "Female" }.to_string());
            polyuria.push(if positive || i % 5 == 0 { "Yes" } else { "No" }.to_string());
            class.push(if positive { "Positive" } else { "Negative" }.to_string());
        }
        Dataset::new(
            vec!["Age".into(), "Gender".into(), "Polyuria".into(), "class".into()],
            vec![age, gender, polyuria, class],
        )
        .unwrap()
    }

    #[test]
    fn pipeline_preserves_feature_order_and_invariants() {
        let pipeline = FeaturePipeline::new(schema(), TransformOptions::default());
        let (train, test, fitted) =
            pipeline.fit_transform(&survey(48), &survey(24)).unwrap();

        assert_eq!(fitted.feature_names, vec!["Age", "Gender", "Polyuria"]);
        assert_eq!(train.features.feature_names, test.features.feature_names);
        assert_eq!(train.features.n_rows(), train.labels.len());
        assert_eq!(test.features.n_rows(), test.labels.len());
        // Test split untouched by resampling under the default options.
        assert_eq!(test.features.n_rows(), 24);
        // Train split was rebalanced: the minority class is oversampled to
        // parity and the Tomek pass can only thin the former majority.
        let n_pos = train.labels.iter().filter(|&&y| y == 1).count();
        let n_neg = train.labels.len() - n_pos;
        assert_eq!(n_pos, 32);
        assert!(n_neg <= 32, "{n_pos} vs {n_neg}");
    }

    #[test]
    fn resample_test_option_rebalances_the_test_split_too() {
        let options = TransformOptions { resample_test: true, ..Default::default() };
        let pipeline = FeaturePipeline::new(schema(), options);
        let (_, test, _) = pipeline.fit_transform(&survey(48), &survey(24)).unwrap();
        let n_pos = test.labels.iter().filter(|&&y| y == 1).count();
        let n_neg = test.labels.len() - n_pos;
        assert_eq!(n_pos, 16);
        assert!(n_neg <= 16, "{n_pos} vs {n_neg}");
    }

    #[test]
    fn fitted_transform_json_round_trip() {
        let pipeline = FeaturePipeline::new(schema(), TransformOptions::default());
        let (_, _, fitted) = pipeline.fit_transform(&survey(48), &survey(24)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts/transform.json");
        fitted.save_json_file(&path).unwrap();
        let back = FittedTransform::load_json_file(&path).unwrap();
        assert_eq!(back, fitted);

        let probe = [40.0, 1.0, 1.0];
        assert_eq!(back.transform_row(&probe).unwrap(), fitted.transform_row(&probe).unwrap());
    }
}

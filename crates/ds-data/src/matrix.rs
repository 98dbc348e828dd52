//! Dense numeric feature matrices and their Parquet persistence.
//!
//! Transformed splits are stored as Parquet files of `Float64` columns with
//! the label as the last column, so they can be inspected with any
//! columnar tooling and reloaded without re-running the transform.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ds_core::{Error, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

/// Row-major dense matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Build a matrix, rejecting ragged rows up front.
    pub fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let p = feature_names.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != p {
                return Err(Error::Data(format!(
                    "row {i} has {} values, expected {p}",
                    row.len()
                )));
            }
        }
        Ok(Self { feature_names, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Copy of column `j`.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[j]).collect()
    }
}

/// Persist features + labels as Parquet, label in the trailing column.
///
/// Row-count agreement between features and labels is an invariant of the
/// transform stage, re-checked here before anything touches disk.
pub fn save_labeled_matrix(
    path: &Path,
    features: &FeatureMatrix,
    labels: &[u8],
    label_name: &str,
) -> Result<()> {
    if features.n_rows() != labels.len() {
        return Err(Error::Data(format!(
            "feature matrix has {} rows but {} labels",
            features.n_rows(),
            labels.len()
        )));
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut fields: Vec<Field> = features
        .feature_names
        .iter()
        .map(|n| Field::new(n, DataType::Float64, false))
        .collect();
    fields.push(Field::new(label_name, DataType::Float64, false));
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(features.n_features() + 1);
    for j in 0..features.n_features() {
        arrays.push(Arc::new(Float64Array::from(features.column(j))));
    }
    arrays.push(Arc::new(Float64Array::from(
        labels.iter().map(|&v| v as f64).collect::<Vec<f64>>(),
    )));

    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| Error::Data(format!("failed to assemble record batch: {e}")))?;

    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .map_err(|e| Error::Data(format!("failed to open parquet writer {}: {e}", path.display())))?;
    writer
        .write(&batch)
        .map_err(|e| Error::Data(format!("failed to write parquet {}: {e}", path.display())))?;
    writer
        .close()
        .map_err(|e| Error::Data(format!("failed to finish parquet {}: {e}", path.display())))?;
    Ok(())
}

/// Load a labeled matrix saved by [`save_labeled_matrix`]. The trailing
/// column is the label and must hold only 0/1 values.
pub fn load_labeled_matrix(path: &Path) -> Result<(FeatureMatrix, Vec<u8>)> {
    let file = File::open(path)
        .map_err(|e| Error::Data(format!("failed to open {}: {e}", path.display())))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Data(format!("failed to read parquet {}: {e}", path.display())))?;
    let reader = builder
        .build()
        .map_err(|e| Error::Data(format!("failed to read parquet {}: {e}", path.display())))?;

    let batches: std::result::Result<Vec<RecordBatch>, _> = reader.collect();
    let batches =
        batches.map_err(|e| Error::Data(format!("failed to read parquet {}: {e}", path.display())))?;
    let first = batches
        .first()
        .ok_or_else(|| Error::Data(format!("{} holds no record batches", path.display())))?;
    let schema = first.schema();
    let n_cols = schema.fields().len();
    if n_cols < 2 {
        return Err(Error::Data(format!(
            "{} has {n_cols} columns; expected at least one feature plus the label",
            path.display()
        )));
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); n_cols];
    for batch in &batches {
        for (j, col) in columns.iter_mut().enumerate() {
            let array = batch
                .column(j)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    Error::Data(format!(
                        "{}: column '{}' is not Float64",
                        path.display(),
                        schema.field(j).name()
                    ))
                })?;
            for i in 0..array.len() {
                col.push(array.value(i));
            }
        }
    }

    let label_col = columns.pop().expect("checked n_cols >= 2");
    let mut labels = Vec::with_capacity(label_col.len());
    for (i, v) in label_col.iter().enumerate() {
        if *v == 0.0 {
            labels.push(0u8);
        } else if *v == 1.0 {
            labels.push(1u8);
        } else {
            return Err(Error::Data(format!(
                "{}: label row {i} is {v}, expected 0 or 1",
                path.display()
            )));
        }
    }

    let feature_names: Vec<String> =
        schema.fields().iter().take(n_cols - 1).map(|f| f.name().clone()).collect();
    let n_rows = labels.len();
    let mut rows = vec![Vec::with_capacity(n_cols - 1); n_rows];
    for col in &columns {
        for (i, v) in col.iter().enumerate() {
            rows[i].push(*v);
        }
    }

    Ok((FeatureMatrix::new(feature_names, rows)?, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (FeatureMatrix, Vec<u8>) {
        let m = FeatureMatrix::new(
            vec!["Age".into(), "Polyuria".into()],
            vec![vec![40.0, 1.0], vec![35.0, 0.0], vec![52.0, 1.0]],
        )
        .unwrap();
        (m, vec![1, 0, 1])
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0, 2.0]]).unwrap_err();
        assert!(err.to_string().contains("expected 1"));
    }

    #[test]
    fn parquet_round_trip() {
        let (m, labels) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transformed/train.parquet");
        save_labeled_matrix(&path, &m, &labels, "class").unwrap();
        let (back, back_labels) = load_labeled_matrix(&path).unwrap();
        assert_eq!(back, m);
        assert_eq!(back_labels, labels);
    }

    #[test]
    fn row_label_mismatch_is_rejected() {
        let (m, _) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        let err = save_labeled_matrix(&path, &m, &[1, 0], "class").unwrap_err();
        assert!(err.to_string().contains("labels"));
    }
}

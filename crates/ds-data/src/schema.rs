//! Declarative dataset schema, loaded once from YAML and validated eagerly.
//!
//! The schema is the contract for what a survey CSV must look like: the full
//! ordered column list, which columns are numerical vs categorical, and which
//! column carries the label. A malformed schema aborts the run at load time,
//! not at first use.

use std::path::Path;

use ds_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Expected shape of a survey dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Every expected column, in file order (target included).
    pub columns: Vec<String>,
    /// Columns whose cells must parse as numbers.
    pub numerical_columns: Vec<String>,
    /// Columns holding categorical survey answers.
    pub categorical_columns: Vec<String>,
    /// The label column.
    pub target_column: String,
}

impl DatasetSchema {
    /// Load and validate a schema from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read schema {}: {e}", path.display())))?;
        let schema: DatasetSchema = serde_yaml_ng::from_str(&text)
            .map_err(|e| Error::Config(format!("malformed schema {}: {e}", path.display())))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Semantic checks beyond what serde enforces. Fails fast so that a bad
    /// schema never reaches the validator or the transformer.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Config("schema has an empty 'columns' list".to_string()));
        }
        if self.numerical_columns.is_empty() && self.categorical_columns.is_empty() {
            return Err(Error::Config(
                "schema declares neither numerical nor categorical columns".to_string(),
            ));
        }
        if self.target_column.is_empty() {
            return Err(Error::Config("schema has an empty 'target_column'".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for name in &self.columns {
            if !seen.insert(name.as_str()) {
                return Err(Error::Config(format!("schema lists column '{name}' twice")));
            }
        }

        if !self.columns.iter().any(|c| c == &self.target_column) {
            return Err(Error::Config(format!(
                "target column '{}' is not in the schema column list",
                self.target_column
            )));
        }
        for name in &self.numerical_columns {
            if !self.columns.iter().any(|c| c == name) {
                return Err(Error::Config(format!(
                    "numerical column '{name}' is not in the schema column list"
                )));
            }
        }
        for name in &self.categorical_columns {
            if !self.columns.iter().any(|c| c == name) {
                return Err(Error::Config(format!(
                    "categorical column '{name}' is not in the schema column list"
                )));
            }
        }
        Ok(())
    }

    /// Number of columns a conforming dataset must have.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Feature columns: the full column list minus the target, in order.
    /// This order is the feature-vector contract shared with the prediction
    /// side, so it must stay stable.
    pub fn feature_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| *c != &self.target_column)
            .map(|c| c.as_str())
            .collect()
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        self.categorical_columns.iter().any(|c| c == name)
    }
}

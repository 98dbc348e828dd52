//! Persisted per-sample evaluation scores.
//!
//! The evaluate stage writes one of these; the viz commands re-read it to
//! build ROC and calibration artifacts without re-running the model.

use std::path::Path;

use ds_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ground-truth labels with the model's positive-class probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSet {
    /// Ground-truth binary labels.
    pub y_true: Vec<u8>,
    /// Positive-class probabilities, aligned with `y_true`.
    pub scores: Vec<f64>,
}

impl ScoreSet {
    /// Build a validated score set.
    pub fn new(y_true: Vec<u8>, scores: Vec<f64>) -> Result<Self> {
        let set = Self { y_true, scores };
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<()> {
        if self.y_true.len() != self.scores.len() {
            return Err(Error::Data(format!(
                "{} labels but {} scores",
                self.y_true.len(),
                self.scores.len()
            )));
        }
        if self.y_true.is_empty() {
            return Err(Error::Data("score set is empty".to_string()));
        }
        Ok(())
    }

    /// Write the scores as pretty JSON, creating parent directories.
    pub fn save_json_file(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reload a score set written by [`ScoreSet::save_json_file`].
    pub fn load_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Data(format!("failed to read scores {}: {e}", path.display())))?;
        let set: ScoreSet = serde_json::from_str(&text)?;
        set.validate()?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let set = ScoreSet::new(vec![0, 1, 1], vec![0.2, 0.7, 0.9]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval/scores.json");
        set.save_json_file(&path).unwrap();
        let back = ScoreSet::load_json_file(&path).unwrap();
        assert_eq!(back.y_true, set.y_true);
        assert_eq!(back.scores, set.scores);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        assert!(ScoreSet::new(vec![0, 1], vec![0.2]).is_err());
    }
}

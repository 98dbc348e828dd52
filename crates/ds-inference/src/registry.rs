//! Model publication and latest-version resolution.
//!
//! Publishing copies a trained artifact (never moves it) to a pusher
//! location and a version-stamped saved-models location. There is no
//! rollback: if the second copy fails the first stays put, and the caller
//! retries the publish.

use std::path::{Path, PathBuf};

use ds_core::{Error, Result};
use serde::Serialize;

/// Record of a completed publish.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedModel {
    pub model_file_path: PathBuf,
    pub saved_model_path: PathBuf,
}

fn copy_into(src: &Path, dst: &Path) -> Result<()> {
    if let Some(dir) = dst.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::copy(src, dst)?;
    Ok(())
}

/// Copy a trained model to both destinations, creating parent directories.
pub fn publish_model(
    trained_model_path: &Path,
    model_file_path: &Path,
    saved_model_path: &Path,
) -> Result<PublishedModel> {
    copy_into(trained_model_path, model_file_path)?;
    copy_into(trained_model_path, saved_model_path)?;
    tracing::info!(
        model = %model_file_path.display(),
        saved = %saved_model_path.display(),
        "model published"
    );
    Ok(PublishedModel {
        model_file_path: model_file_path.to_path_buf(),
        saved_model_path: saved_model_path.to_path_buf(),
    })
}

/// Resolves versions inside a saved-models directory whose subdirectories
/// are named by their publication timestamp.
pub struct ModelRegistry {
    root: PathBuf,
}

impl ModelRegistry {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Path for a new version stamped with `timestamp`.
    pub fn version_path(&self, timestamp: u64, file_name: &str) -> PathBuf {
        self.root.join(timestamp.to_string()).join(file_name)
    }

    /// The `file_name` artifact inside the highest-numbered version
    /// directory. Errors when the registry holds no versions yet.
    pub fn latest_model_path(&self, file_name: &str) -> Result<PathBuf> {
        let mut latest: Option<u64> = None;
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            Error::Config(format!("cannot read model registry {}: {e}", self.root.display()))
        })?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(ts) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) {
                latest = Some(latest.map_or(ts, |cur| cur.max(ts)));
            }
        }
        let ts = latest.ok_or_else(|| {
            Error::Config(format!("model registry {} holds no versions", self.root.display()))
        })?;
        Ok(self.root.join(ts.to_string()).join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn publish_copies_without_moving_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let trained = dir.path().join("artifact/model.json");
        std::fs::create_dir_all(trained.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(&trained).unwrap();
        f.write_all(b"{\"weights\":[]}").unwrap();

        let pusher = dir.path().join("pusher/model.json");
        let saved = dir.path().join("saved_models/1731484161/model.json");
        let record = publish_model(&trained, &pusher, &saved).unwrap();

        assert!(trained.exists(), "source must be retained");
        assert!(record.model_file_path.exists());
        assert!(record.saved_model_path.exists());
        assert_eq!(
            std::fs::read(&trained).unwrap(),
            std::fs::read(&record.saved_model_path).unwrap()
        );
    }

    #[test]
    fn latest_resolution_picks_the_highest_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        for ts in ["100", "250", "90"] {
            let version = dir.path().join(ts);
            std::fs::create_dir_all(&version).unwrap();
            std::fs::write(version.join("model.json"), b"{}").unwrap();
        }
        // Non-numeric entries are ignored.
        std::fs::create_dir_all(dir.path().join("scratch")).unwrap();

        let registry = ModelRegistry::new(dir.path().to_path_buf());
        let latest = registry.latest_model_path("model.json").unwrap();
        assert!(latest.ends_with("250/model.json"));
    }

    #[test]
    fn empty_registry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path().to_path_buf());
        assert!(registry.latest_model_path("model.json").is_err());
    }
}

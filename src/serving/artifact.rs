use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{
    error::ArtifactErr,
    model::{ModelSpec, Regressor},
};

/// The on-disk form of an artifact, as written by the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub model: ModelSpec,
    pub columns: Vec<String>,
}

/// A trained model together with the ordered names of the columns it was fitted on.
///
/// Immutable once loaded, a newer artifact replaces it as a whole.
#[derive(Debug)]
pub struct ModelArtifact {
    model: Box<dyn Regressor>,
    columns: Vec<String>,
}

impl ModelArtifact {
    /// Creates a new `ModelArtifact`.
    ///
    /// # Arguments
    /// * `model` - The fitted regressor.
    /// * `columns` - The training column names, in training order.
    ///
    /// # Returns
    /// The artifact, or the reason why the column names are unusable.
    pub fn new(model: Box<dyn Regressor>, columns: Vec<String>) -> Result<Self, String> {
        if columns.is_empty() {
            return Err("artifact has no columns".into());
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.is_empty() {
                return Err("artifact has an empty column name".into());
            }
            if !seen.insert(column.as_str()) {
                return Err(format!("column {column:?} appears more than once"));
            }
        }

        Ok(Self { model, columns })
    }

    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Where the service reads artifacts from.
pub trait ArtifactStore: Send + Sync {
    /// Whether `path` resolves to an artifact.
    fn exists(&self, path: &Path) -> bool;

    /// Reads and deserializes the whole artifact at `path`.
    ///
    /// # Returns
    /// `ArtifactErr::NotFound` if nothing lives at `path`, `ArtifactErr::Corrupt` if it can't
    /// be deserialized into a valid artifact.
    fn load(&self, path: &Path) -> Result<ModelArtifact, ArtifactErr>;
}

/// Artifacts stored as JSON files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactStore;

impl FsArtifactStore {
    pub fn new() -> Self {
        Self
    }

    /// Writes `artifact` to `path`, creating parent directories as needed.
    ///
    /// The file is written next to its destination and renamed into place, so a concurrent
    /// `load` sees either the previous artifact or the new one.
    pub fn save(&self, path: &Path, artifact: &ArtifactFile) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let bytes = serde_json::to_vec(artifact)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;

        debug!("saved artifact to {}", path.display());
        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&self, path: &Path) -> Result<ModelArtifact, ArtifactErr> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArtifactErr::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(ArtifactErr::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let corrupt = |reason: String| ArtifactErr::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let ArtifactFile { model, columns } =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        let model = model.build().map_err(corrupt)?;

        ModelArtifact::new(model, columns).map_err(corrupt)
    }
}

#[cfg(test)]
mod tests {
    use std::{env, process};

    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        env::temp_dir()
            .join(format!("house-price-serving-artifact-{}", process::id()))
            .join(name)
    }

    fn linear_file(columns: &[&str]) -> ArtifactFile {
        ArtifactFile {
            model: ModelSpec::Linear {
                weights: vec![1.0; columns.len()],
                intercept: 0.0,
            },
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let store = FsArtifactStore::new();
        let path = scratch_path("missing/model.json");

        assert!(!store.exists(&path));
        assert!(matches!(store.load(&path), Err(ArtifactErr::NotFound { .. })));
    }

    #[test]
    fn garbage_is_corrupt() {
        let store = FsArtifactStore::new();
        let path = scratch_path("garbage/model.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"\x00not json").unwrap();

        assert!(store.exists(&path));
        assert!(matches!(store.load(&path), Err(ArtifactErr::Corrupt { .. })));
    }

    #[test]
    fn saved_artifact_loads_with_column_order() {
        let store = FsArtifactStore::new();
        let path = scratch_path("saved/model.json");
        store
            .save(&path, &linear_file(&["Latitude", "MedInc", "HouseAge"]))
            .unwrap();

        let artifact = store.load(&path).unwrap();

        assert_eq!(artifact.columns(), ["Latitude", "MedInc", "HouseAge"]);
        assert_eq!(artifact.model().n_features(), 3);
    }

    #[test]
    fn duplicate_columns_are_corrupt() {
        let store = FsArtifactStore::new();
        let path = scratch_path("duplicate/model.json");
        store
            .save(&path, &linear_file(&["MedInc", "MedInc"]))
            .unwrap();

        let err = store.load(&path).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}

#![allow(dead_code)]

use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicUsize, Ordering},
};

use house_price_serving::serving::{ArtifactFile, FsArtifactStore, ModelSpec};

pub const CALIFORNIA_COLUMNS: [&str; 8] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

pub const SAMPLE_FEATURES: [f64; 8] = [0.038, 0.02, 5.0, 1.0, 0.02, 3.0, 37.0, -122.0];

/// A scratch directory removed on drop.
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new(name: &str) -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);

        let path = env::temp_dir().join(format!(
            "house-price-serving-{name}-{}-{}",
            process::id(),
            NEXT.fetch_add(1, Ordering::SeqCst)
        ));
        fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    pub fn join(&self, file: &str) -> PathBuf {
        self.0.join(file)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

pub fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

/// A linear model roughly shaped like one fitted on the California housing data.
pub fn california_artifact() -> ArtifactFile {
    ArtifactFile {
        model: ModelSpec::Linear {
            weights: vec![0.44, 0.0097, -0.11, 0.65, -0.000004, -0.0038, -0.42, -0.43],
            intercept: -37.0,
        },
        columns: columns(&CALIFORNIA_COLUMNS),
    }
}

pub fn linear_artifact(names: &[&str], weights: &[f64], intercept: f64) -> ArtifactFile {
    ArtifactFile {
        model: ModelSpec::Linear {
            weights: weights.to_vec(),
            intercept,
        },
        columns: columns(names),
    }
}

pub fn write_artifact(path: &Path, artifact: &ArtifactFile) {
    FsArtifactStore::new().save(path, artifact).unwrap();
}

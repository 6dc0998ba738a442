use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};
use ndarray::{Array1, Axis};
use parking_lot::Mutex;

use super::{
    artifact::{ArtifactStore, FsArtifactStore, ModelArtifact},
    error::{ArtifactErr, Result, ServingErr},
    request::{FeatureSchema, PredictRequest},
};
use crate::config::ServingConfig;

/// An artifact together with the feature schema derived from it at load time.
#[derive(Debug)]
pub struct LoadedModel {
    artifact: ModelArtifact,
    schema: FeatureSchema,
}

impl LoadedModel {
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn predict(&self, request: &PredictRequest) -> Result<f64> {
        let x = self.schema.vectorize(request)?;
        let x = Array1::from(x).insert_axis(Axis(0));

        let prediction = self
            .artifact
            .model()
            .predict(x.view())
            .into_iter()
            .next()
            .ok_or(ServingErr::EmptyPrediction)?;

        if !prediction.is_finite() {
            return Err(ServingErr::NonFinitePrediction(prediction));
        }

        Ok(prediction)
    }
}

/// Serves predictions from the artifact stored at a fixed path.
///
/// The service starts without a model and loads it either through `startup_probe` or lazily
/// on the first prediction. Once loaded the model stays in place for the rest of the process,
/// only an explicit `load` replaces it.
pub struct InferenceService<S = FsArtifactStore> {
    store: S,
    path: PathBuf,
    target_column: String,
    slot: Mutex<Option<Arc<LoadedModel>>>,
}

impl InferenceService<FsArtifactStore> {
    /// Creates a service reading from the local filesystem as configured.
    pub fn from_config(config: &ServingConfig) -> Self {
        Self::new(
            FsArtifactStore::new(),
            config.model_path.clone(),
            config.target_column.clone(),
        )
    }
}

impl<S: ArtifactStore> InferenceService<S> {
    /// Creates a new `InferenceService` with no model loaded.
    ///
    /// # Arguments
    /// * `store` - Where artifacts are read from.
    /// * `path` - The artifact location inside `store`.
    /// * `target_column` - The label column to drop from the artifact's columns.
    ///
    /// # Returns
    /// A new `InferenceService` instance.
    pub fn new(store: S, path: impl Into<PathBuf>, target_column: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
            target_column: target_column.into(),
            slot: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a model is currently loaded.
    ///
    /// Never waits on a load in progress, a contended slot reports `false`.
    pub fn is_loaded(&self) -> bool {
        self.slot.try_lock().is_some_and(|slot| slot.is_some())
    }

    /// The feature names of the loaded model, in the order positional requests must follow.
    pub fn feature_names(&self) -> Option<Vec<String>> {
        self.slot
            .lock()
            .as_ref()
            .map(|loaded| loaded.schema.names().to_vec())
    }

    /// Reads the artifact and installs it, replacing any previously loaded one.
    ///
    /// On failure the current state is kept as is.
    pub fn load(&self) -> std::result::Result<Arc<LoadedModel>, ArtifactErr> {
        let mut slot = self.slot.lock();
        let loaded = Arc::new(self.read()?);
        *slot = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Best-effort warm-up run once when the server starts accepting requests.
    ///
    /// A failure is only logged, the service stays reachable and retries on the first request.
    pub fn startup_probe(&self) {
        if !self.store.exists(&self.path) {
            warn!(
                "no model at {} yet, will retry on first request",
                self.path.display()
            );
            return;
        }

        if let Err(e) = self.load() {
            warn!("startup model load failed: {e}");
        }
    }

    /// Predicts a single value for `request`.
    ///
    /// Loads the model first if it isn't loaded yet, concurrent callers wait for a single load.
    ///
    /// # Returns
    /// The model's output, `ServiceUnavailable` if no model could be loaded or a request-shape
    /// error if `request` doesn't match the model's features.
    pub fn predict(&self, request: &PredictRequest) -> Result<f64> {
        let loaded = self.ensure_loaded()?;
        loaded.predict(request)
    }

    fn ensure_loaded(&self) -> std::result::Result<Arc<LoadedModel>, ArtifactErr> {
        let mut slot = self.slot.lock();
        if let Some(loaded) = slot.as_ref() {
            return Ok(Arc::clone(loaded));
        }

        debug!("model not loaded, loading from {}", self.path.display());
        let loaded = Arc::new(self.read().inspect_err(|e| warn!("lazy model load failed: {e}"))?);
        *slot = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    fn read(&self) -> std::result::Result<LoadedModel, ArtifactErr> {
        let artifact = self.store.load(&self.path)?;
        let schema = FeatureSchema::from_columns(artifact.columns(), &self.target_column);

        let width = artifact.model().n_features();
        if schema.len() != width {
            return Err(ArtifactErr::Corrupt {
                path: self.path.clone(),
                reason: format!(
                    "model expects {width} features but the artifact lists {}",
                    schema.len()
                ),
            });
        }

        info!(
            "model loaded from {}, feature columns: {:?}",
            self.path.display(),
            schema.names()
        );

        Ok(LoadedModel { artifact, schema })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::serving::model::ModelSpec;

    /// An in-memory store that has an artifact only after `publish`.
    #[derive(Default)]
    struct MemoryStore {
        columns: Mutex<Option<Vec<String>>>,
        loads: AtomicUsize,
    }

    impl MemoryStore {
        fn publish(&self, columns: &[&str]) {
            *self.columns.lock() = Some(columns.iter().map(|c| c.to_string()).collect());
        }
    }

    impl ArtifactStore for MemoryStore {
        fn exists(&self, _path: &Path) -> bool {
            self.columns.lock().is_some()
        }

        fn load(&self, path: &Path) -> std::result::Result<ModelArtifact, ArtifactErr> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let columns = self
                .columns
                .lock()
                .clone()
                .ok_or_else(|| ArtifactErr::NotFound {
                    path: path.to_path_buf(),
                })?;

            let model = ModelSpec::Linear {
                weights: (1..=columns.len()).map(|w| w as f64).collect(),
                intercept: 0.0,
            }
            .build()
            .unwrap();

            Ok(ModelArtifact::new(model, columns).unwrap())
        }
    }

    fn service() -> InferenceService<MemoryStore> {
        InferenceService::new(MemoryStore::default(), "mem://model", "MedHouseVal")
    }

    #[test]
    fn starts_unloaded_and_probe_failure_is_swallowed() {
        let service = service();

        service.startup_probe();

        assert!(!service.is_loaded());
        assert_eq!(service.feature_names(), None);
    }

    #[test]
    fn predict_loads_lazily_once() {
        let service = service();
        service.store.publish(&["a", "b"]);

        let req = PredictRequest::Positional(vec![1.0, 1.0]);
        assert_eq!(service.predict(&req).unwrap(), 3.0);
        assert_eq!(service.predict(&req).unwrap(), 3.0);

        assert_eq!(service.store.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn load_failure_keeps_service_unloaded() {
        let service = service();

        let err = service
            .predict(&PredictRequest::Positional(vec![1.0]))
            .unwrap_err();

        assert!(matches!(err, ServingErr::ServiceUnavailable(_)));
        assert!(!service.is_loaded());
    }

    #[test]
    fn width_mismatch_is_corrupt() {
        let service = service();
        // The target column is dropped, leaving one feature for a two-weight model.
        service.store.publish(&["a", "MedHouseVal"]);

        match service.load() {
            Err(ArtifactErr::Corrupt { reason, .. }) => assert!(reason.contains("2 features")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn startup_probe_swallows_an_invalid_artifact() {
        let service = service();
        service.store.publish(&["a", "MedHouseVal"]);

        service.startup_probe();

        assert!(!service.is_loaded());
        assert_eq!(service.store.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn is_loaded_does_not_wait_for_a_load_in_progress() {
        let service = service();
        service.store.publish(&["a", "b"]);
        service.load().unwrap();

        let held = service.slot.lock();
        assert!(!service.is_loaded());
        drop(held);

        assert!(service.is_loaded());
    }

    #[test]
    fn overflowing_prediction_is_rejected() {
        let service = service();
        service.store.publish(&["a", "b"]);

        // Weights are [1, 2], the sum overflows to +inf.
        let err = service
            .predict(&PredictRequest::Positional(vec![1.7e308, 1.7e308]))
            .unwrap_err();

        assert!(matches!(err, ServingErr::NonFinitePrediction(v) if v.is_infinite()));
        assert_eq!(err.status(), 500);
    }
}

pub mod artifact;
pub mod error;
pub mod http;
pub mod model;
pub mod request;
pub mod service;

pub use artifact::{ArtifactFile, ArtifactStore, FsArtifactStore, ModelArtifact};
pub use error::{ArtifactErr, ServingErr};
pub use http::HttpServer;
pub use model::{ModelSpec, Regressor, TreeNode};
pub use request::{FeatureSchema, PredictRequest};
pub use service::InferenceService;

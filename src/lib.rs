pub mod config;
pub mod serving;

pub use config::ServingConfig;
pub use serving::{HttpServer, InferenceService};

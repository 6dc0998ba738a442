use std::{env, error::Error, fmt, num::NonZeroUsize, path::PathBuf};

pub const DEFAULT_MODEL_PATH: &str = "/app/models/model.json";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_TARGET_COLUMN: &str = "MedHouseVal";

/// A malformed environment value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigErr {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}={:?}: {}", self.key, self.value, self.reason)
    }
}

impl Error for ConfigErr {}

/// Settings read once at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct ServingConfig {
    /// Where the trainer leaves the artifact.
    pub model_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Amount of threads handling requests concurrently.
    pub threads: NonZeroUsize,
    /// Label column never expected in a request.
    pub target_column: String,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            threads: NonZeroUsize::new(DEFAULT_THREADS).unwrap_or(NonZeroUsize::MIN),
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
        }
    }
}

impl ServingConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Recognizes `MODEL_PATH`, `HOST`, `PORT`, `SERVING_THREADS` and `TARGET_COLUMN`, unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigErr> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value for a variable name, if set.
    ///
    /// # Returns
    /// The configuration or the first malformed value found.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigErr>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port.parse().map_err(|e| ConfigErr {
                key: "PORT",
                reason: format!("{e}"),
                value: port,
            })?;
        }
        if let Some(threads) = lookup("SERVING_THREADS") {
            config.threads = threads.parse().map_err(|e| ConfigErr {
                key: "SERVING_THREADS",
                reason: format!("{e}"),
                value: threads,
            })?;
        }
        if let Some(target) = lookup("TARGET_COLUMN") {
            config.target_column = target;
        }

        Ok(config)
    }

    /// The address to bind the HTTP server to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

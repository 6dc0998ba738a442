use std::{error::Error, fmt, io, path::PathBuf};

/// The serving module's result type.
pub type Result<T> = std::result::Result<T, ServingErr>;

/// Failures while reading a model artifact from storage.
#[derive(Debug)]
pub enum ArtifactErr {
    /// The path does not resolve to a file.
    NotFound { path: PathBuf },
    /// The file exists but could not be read.
    Io { path: PathBuf, source: io::Error },
    /// The file was read but is not a valid artifact.
    Corrupt { path: PathBuf, reason: String },
}

impl fmt::Display for ArtifactErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactErr::NotFound { path } => write!(
                f,
                "Model not found at {}. Has the trainer run?",
                path.display()
            ),
            ArtifactErr::Io { path, source } => {
                write!(f, "failed to read model at {}: {source}", path.display())
            }
            ArtifactErr::Corrupt { path, reason } => {
                write!(f, "corrupt model artifact at {}: {reason}", path.display())
            }
        }
    }
}

impl Error for ArtifactErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArtifactErr::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Request-level failures of the inference service.
///
/// None of these terminate the process, each one is local to the request that produced it.
#[derive(Debug)]
pub enum ServingErr {
    /// No artifact could be loaded, the model is not ready yet.
    ServiceUnavailable(ArtifactErr),
    /// A positional request carried the wrong number of values.
    FeatureCountMismatch { got: usize, expected: Vec<String> },
    /// A named request lacks some of the artifact's features.
    MissingFeatures {
        missing: Vec<String>,
        expected: Vec<String>,
    },
    /// A named request carries fields the artifact doesn't know.
    UnknownFeatures {
        unknown: Vec<String>,
        expected: Vec<String>,
    },
    /// The request body is not a valid prediction request.
    InvalidBody(String),
    /// The model returned no output for the input row.
    EmptyPrediction,
    /// The model's output is NaN or infinite and has no JSON representation.
    NonFinitePrediction(f64),
}

impl ServingErr {
    /// The HTTP status code this error is reported with.
    pub fn status(&self) -> u16 {
        match self {
            ServingErr::ServiceUnavailable(_) => 503,
            ServingErr::FeatureCountMismatch { .. } => 400,
            ServingErr::MissingFeatures { .. }
            | ServingErr::UnknownFeatures { .. }
            | ServingErr::InvalidBody(_) => 422,
            ServingErr::EmptyPrediction | ServingErr::NonFinitePrediction(_) => 500,
        }
    }
}

impl fmt::Display for ServingErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServingErr::ServiceUnavailable(cause) => write!(f, "Model not ready: {cause}"),
            ServingErr::FeatureCountMismatch { got, expected } => write!(
                f,
                "Expected {} features in order {expected:?}, got {got}",
                expected.len()
            ),
            ServingErr::MissingFeatures { missing, expected } => write!(
                f,
                "Missing features {missing:?}, expected fields {expected:?}"
            ),
            ServingErr::UnknownFeatures { unknown, expected } => write!(
                f,
                "Unknown features {unknown:?}, expected fields {expected:?}"
            ),
            ServingErr::InvalidBody(reason) => write!(f, "Invalid request body: {reason}"),
            ServingErr::EmptyPrediction => f.write_str("The model returned an empty prediction"),
            ServingErr::NonFinitePrediction(value) => {
                write!(f, "The model returned a non-finite prediction ({value})")
            }
        }
    }
}

impl Error for ServingErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServingErr::ServiceUnavailable(cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<ArtifactErr> for ServingErr {
    fn from(value: ArtifactErr) -> Self {
        Self::ServiceUnavailable(value)
    }
}

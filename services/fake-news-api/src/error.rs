use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single artifact, at load time or while predicting.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse artifact {name}: {source}")]
    Parse { name: String, #[source] source: serde_json::Error },
    #[error("invalid artifact {name}: {reason}")]
    Invalid { name: String, reason: String },
    #[error("model {model} returned label {label}, expected 0 or 1")]
    UnexpectedLabel { model: String, label: i64 },
    #[error("feature vector has dimension {got}, model {model} expects {expected}")]
    DimensionMismatch { model: String, expected: usize, got: usize },
}

/// Registry construction and lookup failures. Everything except `NotFound` is fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("vectorizer artifact not found at {0}")]
    VectorizerMissing(PathBuf),
    #[error("cannot scan artifact directory {path}: {source}")]
    ScanFailed { path: PathBuf, #[source] source: std::io::Error },
    #[error("duplicate model name {name:?} (from {path})")]
    DuplicateModel { name: String, path: PathBuf },
    #[error("model {0:?} is not registered")]
    NotFound(String),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Per-request failures surfaced by the prediction service.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Invalid model name: '{0}'")]
    InvalidModel(String),
    #[error("artifact failure: {0}")]
    ArtifactCorruption(#[from] ArtifactError),
}

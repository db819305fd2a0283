//! Startup-time discovery of the vectorizer and every model artifact in one directory.
//!
//! The registry is built exactly once, before the listener binds, and is read-only for the
//! rest of the process lifetime.

use crate::error::{ArtifactError, RegistryError};
use crate::models::{ModelArtifact, Predictor};
use crate::normalizer::NormalizedText;
use crate::vectorizer::{FeatureVector, TfidfVectorizer};
use newsguard_core::ServiceConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where to look and how artifacts are named.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub artifact_dir: PathBuf,
    pub vectorizer_file: String,
    pub model_suffix: String,
}

impl From<&ServiceConfig> for DiscoveryOptions {
    fn from(cfg: &ServiceConfig) -> Self {
        Self { artifact_dir: cfg.artifact_dir.clone(), vectorizer_file: cfg.vectorizer_file.clone(), model_suffix: cfg.model_suffix.clone() }
    }
}

/// Lookup surface the prediction service needs. `ModelRegistry` is the production implementation.
pub trait ModelCatalog: Send + Sync {
    fn list_models(&self) -> Vec<String>;
    fn has_model(&self, name: &str) -> bool;
    fn get_model(&self, name: &str) -> Result<Arc<dyn Predictor>, RegistryError>;
    fn vectorize(&self, text: &NormalizedText) -> FeatureVector;
}

#[derive(Debug)]
pub struct ModelRegistry {
    vectorizer: TfidfVectorizer,
    models: BTreeMap<String, Arc<dyn Predictor>>,
}

impl ModelRegistry {
    pub fn builder(vectorizer: TfidfVectorizer) -> RegistryBuilder {
        RegistryBuilder { vectorizer, models: BTreeMap::new() }
    }

    /// Scans `opts.artifact_dir`. A missing vectorizer, an unreadable or invalid artifact, or two
    /// artifacts resolving to the same name all abort construction.
    #[instrument(skip_all, fields(dir = %opts.artifact_dir.display()))]
    pub fn discover(opts: &DiscoveryOptions) -> Result<Self, RegistryError> {
        let vec_path = opts.artifact_dir.join(&opts.vectorizer_file);
        if !vec_path.is_file() { return Err(RegistryError::VectorizerMissing(vec_path)); }
        let vectorizer = TfidfVectorizer::load(&vec_path)?;
        info!(path = %vec_path.display(), dim = vectorizer.dim(), vocabulary = vectorizer.vocabulary_size(), "vectorizer loaded");

        let scan_err = |source: std::io::Error| RegistryError::ScanFailed { path: opts.artifact_dir.clone(), source };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&opts.artifact_dir).map_err(scan_err)? {
            paths.push(entry.map_err(scan_err)?.path());
        }
        // Directory enumeration order is platform dependent; sort for reproducible startup logs.
        paths.sort();

        let mut builder = Self::builder(vectorizer);
        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(path = %path.display(), "skipping artifact with non UTF-8 name");
                continue;
            };
            if file_name == opts.vectorizer_file { continue; }
            if !path.is_file() {
                debug!(file = file_name, "skipping non-artifact entry");
                continue;
            }
            let Some(name) = file_name.strip_suffix(opts.model_suffix.as_str()).filter(|n| !n.is_empty()) else {
                debug!(file = file_name, suffix = %opts.model_suffix, "skipping file without model suffix");
                continue;
            };
            let predictor = load_model(&path, name, builder.dim())?;
            info!(model = name, kind = predictor.kind(), "model registered");
            builder.insert_from(name, predictor, &path)?;
        }
        let registry = builder.build();
        if registry.is_empty() { warn!("no model artifacts found; every prediction will be rejected"); }
        Ok(registry)
    }

    pub fn len(&self) -> usize { self.models.len() }
    pub fn is_empty(&self) -> bool { self.models.is_empty() }
    pub fn dim(&self) -> usize { self.vectorizer.dim() }
}

impl ModelCatalog for ModelRegistry {
    /// Registered names in ascending order.
    fn list_models(&self) -> Vec<String> { self.models.keys().cloned().collect() }

    fn has_model(&self, name: &str) -> bool { self.models.contains_key(name) }

    fn get_model(&self, name: &str) -> Result<Arc<dyn Predictor>, RegistryError> {
        self.models.get(name).cloned().ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn vectorize(&self, text: &NormalizedText) -> FeatureVector { self.vectorizer.transform(text) }
}

fn load_model(path: &Path, name: &str, dim: usize) -> Result<Arc<dyn Predictor>, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io { path: path.to_path_buf(), source })?;
    ModelArtifact::from_slice(name, &bytes)?.into_predictor(name, dim)
}

pub struct RegistryBuilder {
    vectorizer: TfidfVectorizer,
    models: BTreeMap<String, Arc<dyn Predictor>>,
}

impl RegistryBuilder {
    pub fn dim(&self) -> usize { self.vectorizer.dim() }

    pub fn insert(&mut self, name: impl Into<String>, predictor: Arc<dyn Predictor>) -> Result<&mut Self, RegistryError> {
        let name = name.into();
        self.insert_from(&name, predictor, Path::new("<memory>"))
    }

    fn insert_from(&mut self, name: &str, predictor: Arc<dyn Predictor>, origin: &Path) -> Result<&mut Self, RegistryError> {
        if self.models.contains_key(name) {
            return Err(RegistryError::DuplicateModel { name: name.to_string(), path: origin.to_path_buf() });
        }
        if predictor.n_features() != self.dim() {
            return Err(ArtifactError::Invalid {
                name: name.to_string(),
                reason: format!("expects {} features, vectorizer dimension is {}", predictor.n_features(), self.dim()),
            }.into());
        }
        self.models.insert(name.to_string(), predictor);
        Ok(self)
    }

    pub fn build(self) -> ModelRegistry { ModelRegistry { vectorizer: self.vectorizer, models: self.models } }
}

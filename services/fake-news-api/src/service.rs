use crate::error::{ArtifactError, PredictionError};
use crate::normalizer::{normalize, Normalizer};
use crate::registry::{ModelCatalog, ModelRegistry};
use newsguard_core::PredictionMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictionRequest {
    pub text: String,
    pub model: String,
}

/// Fixed label convention of the training set: 0 is fake, 1 is genuine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Verdict {
    #[serde(rename = "Fake News")]
    Fake,
    #[serde(rename = "Not A Fake News")]
    NotFake,
}

impl Verdict {
    pub fn from_label(label: i64) -> Option<Self> {
        match label { 0 => Some(Verdict::Fake), 1 => Some(Verdict::NotFake), _ => None }
    }

    pub fn as_str(&self) -> &'static str {
        match self { Verdict::Fake => "Fake News", Verdict::NotFake => "Not A Fake News" }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictionResult {
    /// The caller's text, untouched by normalization.
    pub text: String,
    pub prediction: Verdict,
    pub model: String,
}

/// Stateless per request; safe to share across any number of concurrent callers.
pub struct PredictionService<C: ModelCatalog = ModelRegistry> {
    catalog: Arc<C>,
    normalizer: Normalizer,
    metrics: Arc<PredictionMetrics>,
}

impl<C: ModelCatalog> PredictionService<C> {
    pub fn new(catalog: Arc<C>, metrics: Arc<PredictionMetrics>) -> Self {
        Self::with_normalizer(catalog, metrics, normalize)
    }

    pub fn with_normalizer(catalog: Arc<C>, metrics: Arc<PredictionMetrics>, normalizer: Normalizer) -> Self {
        Self { catalog, normalizer, metrics }
    }

    pub fn catalog(&self) -> &C { &self.catalog }

    pub fn list_models(&self) -> Vec<String> { self.catalog.list_models() }

    #[instrument(skip(self, request), fields(model = %request.model, text_len = request.text.len()))]
    pub fn predict(&self, request: PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let start = Instant::now();
        // Validate first so an unknown model never costs a normalize/vectorize pass.
        let predictor = match self.catalog.get_model(&request.model) {
            Ok(p) => p,
            Err(_) => {
                self.metrics.record_rejection("invalid_model");
                warn!("prediction rejected: unknown model");
                return Err(PredictionError::InvalidModel(request.model));
            }
        };

        let normalized = (self.normalizer)(&request.text);
        let features = self.catalog.vectorize(&normalized);
        debug!(nnz = features.nnz(), dim = features.dim(), "text vectorized");

        let label = predictor.predict(&request.model, &features).map_err(|e| self.corrupt(e))?;
        let verdict = Verdict::from_label(label)
            .ok_or_else(|| self.corrupt(ArtifactError::UnexpectedLabel { model: request.model.clone(), label }))?;

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_prediction(&request.model, verdict.as_str(), latency_ms);
        debug!(label, prediction = verdict.as_str(), latency_ms, "prediction complete");
        Ok(PredictionResult { text: request.text, prediction: verdict, model: request.model })
    }

    fn corrupt(&self, err: ArtifactError) -> PredictionError {
        self.metrics.record_rejection("artifact_failure");
        tracing::error!(error = %err, "artifact failed during prediction");
        PredictionError::ArtifactCorruption(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::models::{ModelArtifact, Predictor};
    use crate::normalizer::NormalizedText;
    use crate::vectorizer::{FeatureVector, TfidfVectorizer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VECTORIZER: &str = r#"{"vocabulary": {"fake": 0, "hoax": 1, "report": 2}, "idf": [1.0, 1.0, 1.0]}"#;

    fn registry() -> Arc<ModelRegistry> {
        let vec = TfidfVectorizer::from_slice("v", VECTORIZER.as_bytes()).unwrap();
        let mut b = ModelRegistry::builder(vec);
        // Negative weight on "fake"/"hoax" pushes towards label 0.
        let keyword = r#"{"kind": "linear", "coef": [-2.0, -2.0, 1.0], "intercept": 0.1}"#;
        let odd = r#"{"kind": "linear", "classes": [0, 7], "coef": [0.0, 0.0, 0.0], "intercept": 1.0}"#;
        for (name, json) in [("keyword", keyword), ("odd_labels", odd)] {
            let p = ModelArtifact::from_slice(name, json.as_bytes()).unwrap().into_predictor(name, 3).unwrap();
            b.insert(name, p).unwrap();
        }
        Arc::new(b.build())
    }

    fn service() -> PredictionService {
        PredictionService::new(registry(), Arc::new(PredictionMetrics::new().unwrap()))
    }

    fn req(text: &str, model: &str) -> PredictionRequest { PredictionRequest { text: text.into(), model: model.into() } }

    #[test]
    fn label_mapping_is_fixed() {
        assert_eq!(Verdict::from_label(0), Some(Verdict::Fake));
        assert_eq!(Verdict::from_label(1), Some(Verdict::NotFake));
        assert_eq!(Verdict::from_label(2), None);
        assert_eq!(Verdict::from_label(-1), None);
        assert_eq!(serde_json::to_string(&Verdict::Fake).unwrap(), "\"Fake News\"");
        assert_eq!(serde_json::to_string(&Verdict::NotFake).unwrap(), "\"Not A Fake News\"");
    }

    #[test]
    fn result_echoes_input_text_and_model() {
        let svc = service();
        let text = "BREAKING: [sic] Total HOAX!!! see https://x.io 100%";
        let out = svc.predict(req(text, "keyword")).unwrap();
        assert_eq!(out.text, text);
        assert_eq!(out.model, "keyword");
        assert_eq!(out.prediction, Verdict::Fake);
    }

    #[test]
    fn neutral_text_is_not_fake() {
        let out = service().predict(req("An official report.", "keyword")).unwrap();
        assert_eq!(out.prediction, Verdict::NotFake);
    }

    #[test]
    fn unknown_model_rejected_with_name() {
        let err = service().predict(req("text", "svm")).unwrap_err();
        assert!(matches!(&err, PredictionError::InvalidModel(n) if n == "svm"));
        assert!(err.to_string().contains("svm"));
    }

    #[test]
    fn out_of_range_label_is_never_mapped() {
        let err = service().predict(req("anything", "odd_labels")).unwrap_err();
        assert!(matches!(err, PredictionError::ArtifactCorruption(ArtifactError::UnexpectedLabel { label: 7, .. })));
    }

    static NORMALIZE_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_normalize(text: &str) -> NormalizedText {
        NORMALIZE_CALLS.fetch_add(1, Ordering::SeqCst);
        normalize(text)
    }

    struct CountingCatalog { inner: Arc<ModelRegistry>, vectorized: AtomicUsize }

    impl ModelCatalog for CountingCatalog {
        fn list_models(&self) -> Vec<String> { self.inner.list_models() }
        fn has_model(&self, name: &str) -> bool { self.inner.has_model(name) }
        fn get_model(&self, name: &str) -> Result<Arc<dyn Predictor>, RegistryError> { self.inner.get_model(name) }
        fn vectorize(&self, text: &NormalizedText) -> FeatureVector {
            self.vectorized.fetch_add(1, Ordering::SeqCst);
            self.inner.vectorize(text)
        }
    }

    #[test]
    fn rejected_request_skips_normalize_and_vectorize() {
        let catalog = Arc::new(CountingCatalog { inner: registry(), vectorized: AtomicUsize::new(0) });
        let metrics = Arc::new(PredictionMetrics::new().unwrap());
        let svc = PredictionService::with_normalizer(catalog.clone(), metrics.clone(), counting_normalize);
        let before = NORMALIZE_CALLS.load(Ordering::SeqCst);
        assert!(svc.predict(req("some fake text", "missing")).is_err());
        assert_eq!(NORMALIZE_CALLS.load(Ordering::SeqCst), before);
        assert_eq!(catalog.vectorized.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.rejected_total.with_label_values(&["invalid_model"]).get(), 1);

        svc.predict(req("some fake text", "keyword")).unwrap();
        assert_eq!(catalog.vectorized.load(Ordering::SeqCst), 1);
        assert!(NORMALIZE_CALLS.load(Ordering::SeqCst) > before);
    }
}

//! Prediction metrics, exposed on `/metrics` in the Prometheus text format.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

const LATENCY_BUCKETS_MS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0];

#[derive(Clone)]
pub struct PredictionMetrics {
    registry: Registry,
    pub predictions_total: IntCounterVec,
    pub rejected_total: IntCounterVec,
    pub latency_ms: HistogramVec,
    pub registered_models: IntGauge,
}

impl PredictionMetrics {
    /// Each instance owns its registry so independent services (and tests) never collide.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let predictions_total = IntCounterVec::new(
            Opts::new("newsguard_predictions_total", "Predictions served, by model and label"),
            &["model", "prediction"],
        )?;
        let rejected_total = IntCounterVec::new(
            Opts::new("newsguard_prediction_rejected_total", "Prediction requests rejected, by reason"),
            &["reason"],
        )?;
        let latency_ms = HistogramVec::new(
            HistogramOpts::new("newsguard_prediction_latency_ms", "Normalize + vectorize + predict latency (ms)")
                .buckets(LATENCY_BUCKETS_MS.to_vec()),
            &["model"],
        )?;
        let registered_models = IntGauge::new("newsguard_registered_models", "Models loaded into the registry")?;
        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(rejected_total.clone()))?;
        registry.register(Box::new(latency_ms.clone()))?;
        registry.register(Box::new(registered_models.clone()))?;
        Ok(Self { registry, predictions_total, rejected_total, latency_ms, registered_models })
    }

    pub fn record_prediction(&self, model: &str, prediction: &str, latency_ms: f64) {
        self.predictions_total.with_label_values(&[model, prediction]).inc();
        self.latency_ms.with_label_values(&[model]).observe(latency_ms);
    }

    pub fn record_rejection(&self, reason: &str) {
        self.rejected_total.with_label_values(&[reason]).inc();
    }

    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for PredictionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionMetrics").field("registered_models", &self.registered_models.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_labelled_by_reason() {
        let m = PredictionMetrics::new().unwrap();
        m.record_rejection("invalid_model");
        m.record_rejection("invalid_model");
        assert_eq!(m.rejected_total.with_label_values(&["invalid_model"]).get(), 2);
        assert!(m.render().unwrap().contains("reason=\"invalid_model\""));
    }
}

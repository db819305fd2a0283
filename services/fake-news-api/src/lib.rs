//! Fake news classification service: normalizes text, vectorizes it with a frozen TF-IDF
//! model and dispatches to one of the classifiers discovered at startup.

use anyhow::{Context, Result};
use axum::Router;
use newsguard_core::{Health, PredictionMetrics, ServiceConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

pub mod api;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod registry;
pub mod service;
pub mod vectorizer;

pub use error::{ArtifactError, PredictionError, RegistryError};
pub use registry::{DiscoveryOptions, ModelCatalog, ModelRegistry};
pub use service::{PredictionRequest, PredictionResult, PredictionService, Verdict};

/// Scans artifacts and assembles the router. Fails if the registry cannot be built, in which
/// case nothing is served.
pub fn build_app(cfg: &ServiceConfig, health: Health) -> Result<Router> {
    let registry = ModelRegistry::discover(&DiscoveryOptions::from(cfg))
        .with_context(|| format!("loading artifacts from {}", cfg.artifact_dir.display()))?;
    let metrics = Arc::new(PredictionMetrics::new().context("registering metrics")?);
    metrics.registered_models.set(registry.len() as i64);
    info!(models = ?registry.list_models(), dim = registry.dim(), "model registry ready");

    let status = serde_json::json!({
        "service": cfg.service_name,
        "models": registry.len(),
        "artifact_dir": cfg.artifact_dir.display().to_string(),
    });
    let service = Arc::new(PredictionService::new(Arc::new(registry), metrics.clone()));
    Ok(api::router(service, health, metrics, status))
}

pub async fn run(cfg: ServiceConfig) -> Result<()> {
    let health = Health::new();
    let app = build_app(&cfg, health.clone())?;
    let addr = cfg.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    health.mark_ready();
    info!(%addr, "service ready");

    let shutdown_health = health.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = signal::ctrl_c().await;
            shutdown_health.clear_ready();
            info!("shutdown");
        })
        .await?;
    Ok(())
}

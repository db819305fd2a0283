//! Core shared utilities for the fake news services: tracing, config, health and metrics.

use anyhow::Result;
use axum::{extract::State, http::{header, StatusCode}, response::{IntoResponse, Response}, routing::get, Json, Router};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod config;
pub mod metrics;

pub use config::{load_config, ConfigError, ServiceConfig};
pub use metrics::PredictionMetrics;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global subscriber. `RUST_LOG` wins over `default_level` when set.
pub fn init_tracing(service: &str, default_level: &str, json: bool) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            registry
                .with(tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(service, json, "tracing initialized");
    Ok(())
}

/// Liveness/readiness flags shared between the bootstrap path and the health routes.
#[derive(Clone, Debug)]
pub struct Health { live: Arc<AtomicBool>, ready: Arc<AtomicBool> }

impl Default for Health {
    fn default() -> Self { Self { live: Arc::new(AtomicBool::new(true)), ready: Arc::new(AtomicBool::new(false)) } }
}

impl Health {
    pub fn new() -> Self { Self::default() }
    pub fn mark_ready(&self) { self.ready.store(true, Ordering::SeqCst); }
    pub fn clear_ready(&self) { self.ready.store(false, Ordering::SeqCst); }
    pub fn mark_not_live(&self) { self.live.store(false, Ordering::SeqCst); }
    pub fn is_live(&self) -> bool { self.live.load(Ordering::SeqCst) }
    pub fn is_ready(&self) -> bool { self.ready.load(Ordering::SeqCst) }
}

struct HealthState {
    health: Health,
    metrics: Arc<PredictionMetrics>,
    status: serde_json::Value,
}

/// `/live`, `/ready`, `/status` and `/metrics`. `status` fields are merged into the `/status` body.
pub fn health_router(health: Health, metrics: Arc<PredictionMetrics>, status: serde_json::Value) -> Router {
    let state = Arc::new(HealthState { health, metrics, status });
    Router::new()
        .route("/live", get(live_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn live_handler(State(st): State<Arc<HealthState>>) -> Response {
    let live = st.health.is_live();
    let code = if live { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(serde_json::json!({"live": live}))).into_response()
}

async fn ready_handler(State(st): State<Arc<HealthState>>) -> Response {
    let ready = st.health.is_ready();
    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(serde_json::json!({"ready": ready}))).into_response()
}

async fn status_handler(State(st): State<Arc<HealthState>>) -> Json<serde_json::Value> {
    let mut body = serde_json::json!({
        "live": st.health.is_live(),
        "ready": st.health.is_ready(),
    });
    if let (Some(out), Some(extra)) = (body.as_object_mut(), st.status.as_object()) {
        for (k, v) in extra { out.insert(k.clone(), v.clone()); }
    }
    Json(body)
}

async fn metrics_handler(State(st): State<Arc<HealthState>>) -> Response {
    match st.metrics.render() {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response(),
    }
}

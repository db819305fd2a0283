//! HTTP surface: welcome, model listing and prediction, plus the shared health routes.

use crate::error::PredictionError;
use crate::service::{PredictionRequest, PredictionResult, PredictionService};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use newsguard_core::{health_router, Health, PredictionMetrics};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub const WELCOME_MESSAGE: &str = "Welcome to the Fake News Detection API!";

#[derive(Debug)]
pub enum ApiError {
    InvalidModel(String),
    Artifact(String),
    Worker(String),
}

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        match e {
            PredictionError::InvalidModel(_) => ApiError::InvalidModel(e.to_string()),
            PredictionError::ArtifactCorruption(_) => ApiError::Artifact(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::InvalidModel(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Artifact(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
            ApiError::Worker(m) => (StatusCode::INTERNAL_SERVER_ERROR, format!("prediction worker failed: {m}")),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Routes with both the slash-terminated paths the front-end calls and their bare forms.
/// `status` is merged into the `/status` body next to the liveness flags.
pub fn router(service: Arc<PredictionService>, health: Health, metrics: Arc<PredictionMetrics>, status: serde_json::Value) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/models/", get(list_models))
        .route("/models", get(list_models))
        .route("/predict/", post(predict))
        .route("/predict", post(predict))
        .with_state(service)
        .merge(health_router(health, metrics, status))
        .layer(CorsLayer::permissive())
}

async fn home() -> Json<serde_json::Value> { Json(json!({ "message": WELCOME_MESSAGE })) }

async fn list_models(State(svc): State<Arc<PredictionService>>) -> Json<serde_json::Value> {
    Json(json!({ "models": svc.list_models() }))
}

async fn predict(
    State(svc): State<Arc<PredictionService>>,
    Json(req): Json<PredictionRequest>,
) -> Result<Json<PredictionResult>, ApiError> {
    // Normalization and inference are CPU bound; keep them off the reactor threads.
    let result = tokio::task::spawn_blocking(move || svc.predict(req))
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))??;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn worker_failure_is_server_error_with_detail() {
        let (status, body) = render(ApiError::Worker("task panicked".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"detail": "prediction worker failed: task panicked"}));
    }

    #[tokio::test]
    async fn invalid_model_is_bad_request() {
        let (status, body) = render(PredictionError::InvalidModel("bert".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"detail": "Invalid model name: 'bert'"}));
    }
}

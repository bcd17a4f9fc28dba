//! 健康检查端点

use crate::models::{HealthResponse, RootResponse};
use crate::server::AppState;
use axum::{extract::State, Json};

/// `GET /`
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let health = state.backend.health().await;
    Json(RootResponse {
        status: "healthy".to_string(),
        message: "Vision API is running".to_string(),
        ollama_status: health.status,
        ollama_url: state.backend.base_url().to_string(),
        model: state.translator.model().to_string(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.backend.health().await;
    if let Some(err) = &health.error {
        tracing::warn!("[HEALTH] 后端状态 {:?}: {}", health.status, err);
    }
    Json(HealthResponse {
        status: "ok".to_string(),
        ollama_status: health.status,
        ollama_url: state.backend.base_url().to_string(),
        model: state.translator.model().to_string(),
        ollama_error: health.error,
    })
}

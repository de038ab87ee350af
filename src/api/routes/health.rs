//! Health check endpoint

use axum::{Json, extract::State, http::StatusCode};

use crate::api::{state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Reports the storage backend health; 503 when the backend is unhealthy
pub async fn health_check(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let timestamp = chrono::Utc::now().to_rfc3339();

    match state.backend.health_check().await {
        Ok(health) if health.healthy => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                timestamp,
                storage: health.message,
                metadata: health.metadata,
            }),
        ),
        Ok(health) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".to_string(),
                timestamp,
                storage: health.message,
                metadata: health.metadata,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".to_string(),
                timestamp,
                storage: e.to_string(),
                metadata: Default::default(),
            }),
        ),
    }
}

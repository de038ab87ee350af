//! Alert history endpoint

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::api::{error::ApiResult, state::ApiState, types::AlertsResponse};

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// GET /api/v1/alerts
///
/// Most recent alerts, newest first
pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<AlertsResponse>> {
    let limit = query.limit.unwrap_or(100).min(1000);

    let alerts = state.backend.query_recent_alerts(limit).await?;

    Ok(Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    }))
}

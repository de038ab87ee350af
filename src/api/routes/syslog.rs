//! Syslog history endpoint

use axum::{
    Json,
    extract::{Query, State},
};
use serde_json::{Value, json};

use crate::api::{error::ApiResult, routes::alerts::LimitQuery, state::ApiState};

/// GET /api/v1/syslog
///
/// Most recent syslog records, newest first
pub async fn list_syslog(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(100).min(1000);

    let records = state.backend.query_recent_syslog(limit).await?;

    Ok(Json(json!({
        "count": records.len(),
        "messages": records,
    })))
}

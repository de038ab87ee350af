//! Device metric history endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::{
    DeviceId,
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{InterfacesResponse, MetricsResponse},
    },
    storage::QueryRange,
};

/// Query parameters for metric time range
#[derive(Debug, Deserialize)]
pub struct MetricQuery {
    /// Start time (ISO 8601 format, default: 1 hour before end)
    start: Option<DateTime<Utc>>,

    /// End time (ISO 8601 format, default: now)
    end: Option<DateTime<Utc>>,

    /// Max results (default: 1000)
    limit: Option<usize>,
}

impl MetricQuery {
    fn resolve(&self) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
        let end = self.end.unwrap_or_else(Utc::now);
        let start = self.start.unwrap_or_else(|| end - Duration::hours(1));

        if start > end {
            return Err(ApiError::InvalidRequest(
                "start must not be after end".to_string(),
            ));
        }
        Ok((start, end))
    }
}

async fn ensure_device(state: &ApiState, device_id: DeviceId) -> ApiResult<()> {
    state
        .backend
        .find_device(device_id)
        .await?
        .map(|_| ())
        .ok_or(ApiError::UnknownDevice(device_id))
}

/// GET /api/v1/devices/:id/metrics
///
/// Samples of one device within a time range, oldest first
pub async fn get_device_metrics(
    State(state): State<ApiState>,
    Path(device_id): Path<DeviceId>,
    Query(query): Query<MetricQuery>,
) -> ApiResult<Json<MetricsResponse>> {
    let (start, end) = query.resolve()?;
    let limit = query.limit.unwrap_or(1000).min(10000);
    ensure_device(&state, device_id).await?;

    let metrics = state
        .backend
        .query_range(QueryRange {
            device_id,
            start,
            end,
            limit: Some(limit),
        })
        .await?;

    Ok(Json(MetricsResponse {
        device_id,
        start: start.to_rfc3339(),
        end: end.to_rfc3339(),
        count: metrics.len(),
        metrics,
    }))
}

/// GET /api/v1/devices/:id/interfaces
///
/// Interface counter samples of one device within a time range
pub async fn get_device_interfaces(
    State(state): State<ApiState>,
    Path(device_id): Path<DeviceId>,
    Query(query): Query<MetricQuery>,
) -> ApiResult<Json<InterfacesResponse>> {
    let (start, end) = query.resolve()?;
    ensure_device(&state, device_id).await?;

    let mut interfaces = state
        .backend
        .query_interface_range(device_id, start, end)
        .await?;
    if let Some(limit) = query.limit {
        interfaces.truncate(limit);
    }

    Ok(Json(InterfacesResponse {
        device_id,
        count: interfaces.len(),
        interfaces,
    }))
}

//! Sample ingestion endpoint

use axum::{Json, extract::State, http::StatusCode};
use tracing::debug;

use crate::{
    DeviceMetrics, MetricSample,
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::IngestResponse,
    },
};

/// POST /api/v1/metrics
///
/// Store a sample pushed by an external collector and evaluate it right away
pub async fn ingest_metric(
    State(state): State<ApiState>,
    Json(sample): Json<MetricSample>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    validate(&sample)?;

    let device = state
        .backend
        .find_device(sample.device_id)
        .await?
        .ok_or(ApiError::UnknownDevice(sample.device_id))?;

    let id = state.backend.insert_metric(&sample).await?;
    debug!(device = %device.name, id, "stored pushed sample");

    let input = DeviceMetrics {
        sample,
        device_name: Some(device.name),
        device_status: Some(device.status),
    };
    let alerts = state.engine.evaluate(&input).await;

    Ok((StatusCode::CREATED, Json(IngestResponse { id, alerts })))
}

fn validate(sample: &MetricSample) -> ApiResult<()> {
    let fields = [
        ("cpuUsage", sample.cpu_usage),
        ("memoryUsage", sample.memory_usage),
        ("diskUsage", sample.disk_usage),
        ("latency", sample.latency),
        ("packetLoss", sample.packet_loss),
    ];

    for (name, value) in fields {
        if let Some(v) = value
            && (!v.is_finite() || v < 0.0)
        {
            return Err(ApiError::InvalidRequest(format!(
                "{name} must be a finite, non-negative number"
            )));
        }
    }

    Ok(())
}

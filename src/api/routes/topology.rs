//! Topology endpoints

use axum::{Json, extract::State};

use crate::{
    api::{error::ApiResult, state::ApiState, types::LinksResponse},
    topology::{NeighborReport, ReconcileSummary},
};

/// POST /api/v1/topology/reports
///
/// Reconcile a neighbor report from a discovery collector
pub async fn submit_report(
    State(state): State<ApiState>,
    Json(report): Json<NeighborReport>,
) -> Json<ReconcileSummary> {
    Json(state.reconciler.reconcile(&report).await)
}

/// GET /api/v1/topology/links
pub async fn list_links(State(state): State<ApiState>) -> ApiResult<Json<LinksResponse>> {
    let links = state.backend.list_links().await?;

    Ok(Json(LinksResponse {
        count: links.len(),
        links,
    }))
}

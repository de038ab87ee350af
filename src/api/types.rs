//! API response types
//!
//! Typed responses instead of ad-hoc `Json<Value>`, so the integration tests
//! deserialize exactly what the handlers serialize.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::storage::schema::{AlertEvent, TopologyLink};
use crate::{DeviceId, InterfaceSample, MetricSample};

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,

    /// Storage backend health message
    pub storage: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Response for POST /api/v1/metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Row id of the stored sample
    pub id: i64,

    /// Alerts fired by this sample
    pub alerts: Vec<AlertEvent>,
}

/// Response for GET /api/v1/devices/:id/metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub device_id: DeviceId,
    pub start: String,
    pub end: String,
    pub count: usize,
    pub metrics: Vec<MetricSample>,
}

/// Response for GET /api/v1/devices/:id/interfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfacesResponse {
    pub device_id: DeviceId,
    pub count: usize,
    pub interfaces: Vec<InterfaceSample>,
}

/// Response for GET /api/v1/alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub count: usize,
    pub alerts: Vec<AlertEvent>,
}

/// Response for POST /api/v1/rules/reload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesReloadResponse {
    /// Number of active rules after the reload
    pub active: usize,

    /// The rule store failed and the built-in rules are active
    pub degraded: bool,
}

/// Response for GET /api/v1/topology/links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksResponse {
    pub count: usize,
    pub links: Vec<TopologyLink>,
}

//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Health is reachable without a token while everything else needs one
//! - Pushed samples are stored and evaluated
//! - Metric history, alerts and links can be read back
//! - Neighbor reports are reconciled
//! - Error handling is correct

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use netpulse::{
    DeviceId,
    api::{
        AlertsResponse, ApiServerConfig, ApiState, HealthResponse, IngestResponse, LinksResponse,
        MetricsResponse, RulesReloadResponse, spawn_api_server,
    },
    storage::memory::MemoryBackend,
    topology::{ReconcileSummary, TopologyReconciler},
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::helpers::{engine_for, memory_backend_with};

const TOKEN: &str = "test-token";

async fn spawn_test_api(backend: Arc<MemoryBackend>) -> SocketAddr {
    let engine = engine_for(&backend);
    let reconciler = Arc::new(TopologyReconciler::new(backend.clone(), backend.clone()));
    let state = ApiState::new(backend, engine, reconciler);

    let config = ApiServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        auth_token: Some(TOKEN.to_string()),
        enable_cors: true,
    };

    spawn_api_server(config, state).await.unwrap()
}

async fn setup() -> (SocketAddr, Vec<DeviceId>, reqwest::Client) {
    let (backend, ids) =
        memory_backend_with(&[("core-01", "10.0.0.1"), ("dist-01", "10.0.0.2")]).await;
    let addr = spawn_test_api(backend).await;
    (addr, ids, reqwest::Client::new())
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let (addr, _, client) = setup().await;

    let response = client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = response.json().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.metadata.get("backend").map(String::as_str), Some("memory"));
}

#[tokio::test]
async fn test_auth_is_enforced() {
    let (addr, _, client) = setup().await;
    let url = format!("http://{addr}/api/v1/alerts");

    let missing = client.get(&url).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let malformed = client
        .get(&url)
        .header("Authorization", TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);

    let wrong = client.get(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    let ok = client.get(&url).bearer_auth(TOKEN).send().await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ingest_stores_and_alerts() {
    let (addr, ids, client) = setup().await;
    let now = Utc::now();

    let response = client
        .post(format!("http://{addr}/api/v1/metrics"))
        .bearer_auth(TOKEN)
        .json(&json!({
            "deviceId": ids[0],
            "collectorId": "agent-7",
            "timestamp": now,
            "status": "online",
            "cpuUsage": 92.0,
            "latency": 3.5,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let ingest: IngestResponse = response.json().await.unwrap();
    assert_eq!(ingest.alerts.len(), 1);
    assert_eq!(ingest.alerts[0].rule_name, "cpu_warning");
    assert!(ingest.alerts[0].message.starts_with("core-01 "));

    let history: MetricsResponse = client
        .get(format!("http://{addr}/api/v1/devices/{}/metrics", ids[0]))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.count, 1);
    assert_eq!(history.metrics[0].collector_id.as_deref(), Some("agent-7"));
    assert_eq!(history.metrics[0].memory_usage, None);

    let alerts: AlertsResponse = client
        .get(format!("http://{addr}/api/v1/alerts?limit=10"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alerts.count, 1);
}

#[tokio::test]
async fn test_ingest_errors() {
    let (addr, _, client) = setup().await;
    let url = format!("http://{addr}/api/v1/metrics");

    let unknown = client
        .post(&url)
        .bearer_auth(TOKEN)
        .json(&json!({"deviceId": 999, "status": "online"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let negative = client
        .post(&url)
        .bearer_auth(TOKEN)
        .json(&json!({"deviceId": 1, "status": "online", "packetLoss": -3.0}))
        .send()
        .await
        .unwrap();
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let history = client
        .get(format!("http://{addr}/api/v1/devices/999/metrics"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(history.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metric_range_validation() {
    let (addr, ids, client) = setup().await;
    let end = Utc::now();
    let start = end + Duration::hours(1);

    let response = client
        .get(format!("http://{addr}/api/v1/devices/{}/metrics", ids[0]))
        .query(&[("start", start.to_rfc3339()), ("end", end.to_rfc3339())])
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_topology_report_roundtrip() {
    let (addr, ids, client) = setup().await;
    let report = json!({
        "sourceDeviceIp": "10.0.0.1",
        "neighbors": [
            {"localPort": "Gi0/1", "remotePort": "Gi0/24", "remoteSystemName": "dist-01"},
            {"localPort": "Gi0/2", "remotePort": "Gi0/1", "remoteIp": "192.0.2.50"}
        ]
    });

    for expected in [
        ReconcileSummary { created: 1, updated: 0, skipped: 1 },
        ReconcileSummary { created: 0, updated: 1, skipped: 1 },
    ] {
        let summary: ReconcileSummary = client
            .post(format!("http://{addr}/api/v1/topology/reports"))
            .bearer_auth(TOKEN)
            .json(&report)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(summary, expected);
    }

    let links: LinksResponse = client
        .get(format!("http://{addr}/api/v1/topology/links"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(links.count, 1);
    assert_eq!(links.links[0].source_id, ids[0]);
    assert_eq!(links.links[0].target_id, ids[1]);
}

#[tokio::test]
async fn test_rules_reload_with_empty_store() {
    let (addr, _, client) = setup().await;

    let reload: RulesReloadResponse = client
        .post(format!("http://{addr}/api/v1/rules/reload"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reload.active, 0);
    assert!(!reload.degraded);
}

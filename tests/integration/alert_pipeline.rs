//! Integration tests for rule evaluation and suppression
//!
//! These tests verify that:
//! - A breaching sample fires each matching rule once per window
//! - Different rules on the same device are suppressed independently
//! - Stored rules replace the built-ins, malformed conditions included
//! - Fired alerts reach broadcast subscribers

use chrono::{Duration, Utc};
use netpulse::{
    DeviceMetrics,
    storage::{AlertSink, InventoryAdmin, schema::RuleSeed},
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::helpers::{cpu_sample, engine_for, memory_backend_with};

#[tokio::test]
async fn test_cpu_warning_then_critical_scenario() {
    let (backend, ids) = memory_backend_with(&[("D1", "10.0.0.1")]).await;
    let engine = engine_for(&backend);
    let t0 = Utc::now();

    let first = engine
        .evaluate_at(&DeviceMetrics::new(cpu_sample(ids[0], 92.0, t0), "D1"), t0)
        .await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].rule_name, "cpu_warning");
    assert_eq!(first[0].severity, "warning");
    assert!(first[0].message.contains("92.0%"));
    assert!(first[0].message.contains("80%"));

    let t1 = t0 + Duration::seconds(10);
    let second = engine
        .evaluate_at(&DeviceMetrics::new(cpu_sample(ids[0], 96.0, t1), "D1"), t1)
        .await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].rule_name, "cpu_critical");
    assert_eq!(second[0].severity, "critical");

    let stored = backend.query_recent_alerts(10).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|a| a.id.is_some()));
}

#[tokio::test]
async fn test_breach_fires_again_after_window() {
    let (backend, ids) = memory_backend_with(&[("D1", "10.0.0.1")]).await;
    let engine = engine_for(&backend);
    let t0 = Utc::now();
    let input = DeviceMetrics::new(cpu_sample(ids[0], 85.0, t0), "D1");

    assert_eq!(engine.evaluate_at(&input, t0).await.len(), 1);
    for offset in [1, 60, 299] {
        let at = t0 + Duration::seconds(offset);
        assert!(engine.evaluate_at(&input, at).await.is_empty());
    }

    let after = t0 + Duration::seconds(301);
    assert_eq!(engine.evaluate_at(&input, after).await.len(), 1);
}

#[tokio::test]
async fn test_devices_are_suppressed_independently() {
    let (backend, ids) = memory_backend_with(&[("D1", "10.0.0.1"), ("D2", "10.0.0.2")]).await;
    let engine = engine_for(&backend);
    let now = Utc::now();

    let batch = vec![
        DeviceMetrics::new(cpu_sample(ids[0], 85.0, now), "D1"),
        DeviceMetrics::new(cpu_sample(ids[1], 85.0, now), "D2"),
        DeviceMetrics::new(cpu_sample(ids[0], 85.0, now), "D1"),
    ];

    let fired = engine.process_metrics_batch_at(&batch, now).await;
    assert_eq!(fired.len(), 2);
    assert_ne!(fired[0].device_id, fired[1].device_id);
}

#[tokio::test]
async fn test_stored_rules_replace_builtins() {
    let (backend, ids) = memory_backend_with(&[("D1", "10.0.0.1")]).await;
    backend
        .upsert_rule(&RuleSeed {
            name: "slow link".to_string(),
            conditions: json!({"metric": "latency", "operator": ">", "threshold": 50}),
            severity: "critical".to_string(),
            enabled: true,
        })
        .await
        .unwrap();
    backend
        .upsert_rule(&RuleSeed {
            name: "garbled".to_string(),
            conditions: json!("not an object"),
            severity: "nonsense".to_string(),
            enabled: true,
        })
        .await
        .unwrap();

    let engine = engine_for(&backend);
    assert_eq!(engine.load_rules().await.unwrap(), 2);

    let now = Utc::now();
    let mut sample = cpu_sample(ids[0], 85.0, now);
    sample.latency = Some(120.0);
    let fired = engine
        .evaluate_at(&DeviceMetrics::new(sample, "D1"), now)
        .await;

    // the garbled rule compiles to cpuUsage > 80 at warning
    let mut names: Vec<(&str, &str)> = fired
        .iter()
        .map(|a| (a.rule_name.as_str(), a.severity.as_str()))
        .collect();
    names.sort();
    assert_eq!(names, vec![("garbled", "warning"), ("slow link", "critical")]);

    let latency_alert = fired.iter().find(|a| a.rule_name == "slow link").unwrap();
    assert_eq!(latency_alert.message, "D1 latency is 120.0ms, threshold > 50ms");
    assert!(latency_alert.rule_id.is_some());
}

#[tokio::test]
async fn test_subscribers_receive_fired_alerts() {
    let (backend, ids) = memory_backend_with(&[("D1", "10.0.0.1")]).await;
    let engine = engine_for(&backend);
    let mut alerts = engine.subscribe();

    let now = Utc::now();
    let fired = engine
        .evaluate_at(&DeviceMetrics::new(cpu_sample(ids[0], 99.0, now), "D1"), now)
        .await;
    assert_eq!(fired.len(), 2);

    let first = alerts.recv().await.unwrap();
    let second = alerts.recv().await.unwrap();
    assert_eq!(vec![first, second], fired);
}

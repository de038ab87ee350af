//! Integration tests for storage persistence
//!
//! These tests verify that:
//! - Scheduled evaluation works over the SQLite backend
//! - Alerts, syslog records and links survive reopening the database
//! - Retention cleanup removes old metrics

use std::sync::Arc;

use chrono::{Duration, Utc};
use netpulse::{
    actors::{retention::RetentionHandle, scheduler::SchedulerHandle},
    alerts::AlertRuleEngine,
    config::SchedulerConfig,
    storage::{
        AlertSink, InventoryAdmin, LogStore, MetricStore, QueryRange, StorageBackend,
        TopologyStore, sqlite::SqliteBackend,
    },
    suppression::InMemorySuppressionStore,
    syslog::parse_datagram,
    topology::{Neighbor, NeighborReport, TopologyReconciler},
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::{cpu_sample, device_seed};

#[tokio::test]
async fn test_scheduled_evaluation_over_sqlite() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("netpulse.db");

    {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let core = backend.upsert_device(&device_seed("core-01", "10.0.0.1")).await.unwrap();
        let edge = backend.upsert_device(&device_seed("edge-01", "10.0.0.2")).await.unwrap();

        let now = Utc::now();
        // stale breach, then a fresh healthy sample for core; a fresh breach for edge
        backend
            .insert_metric(&cpu_sample(core, 99.0, now - Duration::minutes(20)))
            .await
            .unwrap();
        backend
            .insert_metric(&cpu_sample(core, 15.0, now - Duration::seconds(30)))
            .await
            .unwrap();
        backend
            .insert_metric(&cpu_sample(edge, 88.0, now - Duration::seconds(10)))
            .await
            .unwrap();

        let engine = Arc::new(AlertRuleEngine::new(
            backend.clone(),
            backend.clone(),
            Arc::new(InMemorySuppressionStore::new()),
        ));
        let config = SchedulerConfig {
            enabled: true,
            interval_secs: 3600,
            freshness_secs: 300,
        };
        let scheduler = SchedulerHandle::spawn(&config, backend.clone(), engine);

        let summary = scheduler.run_now().await.unwrap();
        assert_eq!(summary.devices, 2);
        // no rules table rows means alerting is disabled, not degraded
        assert!(!summary.degraded);
        assert_eq!(summary.alerts, 0);

        scheduler.shutdown().await.unwrap();
        backend.close().await.unwrap();
    }

    let reopened = SqliteBackend::new(&db_path).await.unwrap();
    let latest = reopened
        .query_latest_per_device(Utc::now() - Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].device_name.as_deref(), Some("core-01"));
    assert_eq!(latest[0].sample.cpu_usage, Some(15.0));
}

#[tokio::test]
async fn test_builtin_rules_fire_when_store_has_no_rules_loaded() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(SqliteBackend::new(temp_dir.path().join("a.db")).await.unwrap());
    let edge = backend.upsert_device(&device_seed("edge-01", "10.0.0.2")).await.unwrap();

    // without load_rules the engine runs on its built-in set
    let engine = AlertRuleEngine::new(
        backend.clone(),
        backend.clone(),
        Arc::new(InMemorySuppressionStore::new()),
    );
    let now = Utc::now();
    let batch = backend
        .query_latest_per_device(now - Duration::minutes(5))
        .await
        .unwrap();
    assert!(batch.is_empty());

    backend.insert_metric(&cpu_sample(edge, 88.0, now)).await.unwrap();
    let batch = backend
        .query_latest_per_device(now - Duration::minutes(5))
        .await
        .unwrap();
    let fired = engine.process_metrics_batch_at(&batch, now).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].message, "edge-01 CPU usage is 88.0%, threshold > 80%");

    let stored = backend.query_recent_alerts(5).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, fired[0].id);
    assert_eq!(stored[0].message, fired[0].message);
    assert_eq!(stored[0].details, fired[0].details);
}

#[tokio::test]
async fn test_syslog_and_links_persist() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("netpulse.db");

    {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        backend.upsert_device(&device_seed("core-01", "10.0.0.1")).await.unwrap();
        backend.upsert_device(&device_seed("dist-01", "10.0.0.2")).await.unwrap();

        let record = parse_datagram(
            b"<13>Dec 15 10:00:00 localhost test: hello",
            "127.0.0.1".parse().unwrap(),
            Utc::now(),
        );
        backend.insert_syslog(&record).await.unwrap();

        let reconciler = TopologyReconciler::new(backend.clone(), backend.clone());
        let report = NeighborReport {
            source_device_ip: "10.0.0.1".parse().unwrap(),
            neighbors: vec![Neighbor {
                local_port: "Gi0/1".to_string(),
                remote_port: "Gi0/48".to_string(),
                remote_chassis_id: None,
                remote_system_name: None,
                remote_ip: Some("10.0.0.2".to_string()),
                link_type: Some("fiber".to_string()),
            }],
        };
        let t0 = Utc::now();
        reconciler.reconcile_at(&report, t0).await;
        reconciler
            .reconcile_at(&report, t0 + Duration::seconds(60))
            .await;

        backend.close().await.unwrap();
    }

    let reopened = SqliteBackend::new(&db_path).await.unwrap();

    let records = reopened.query_recent_syslog(10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].facility, 1);
    assert_eq!(records[0].severity, 5);
    assert_eq!(records[0].message, "Dec 15 10:00:00 localhost test: hello");

    let links = reopened.list_links().await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].link_type, "fiber");
}

#[tokio::test]
async fn test_retention_cleanup() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(SqliteBackend::new(temp_dir.path().join("r.db")).await.unwrap());
    let now = Utc::now();

    for days in [1, 20, 45, 90] {
        backend
            .insert_metric(&cpu_sample(1, 10.0, now - Duration::days(days)))
            .await
            .unwrap();
    }

    let retention = RetentionHandle::spawn(30, backend.clone());
    retention.run_now().await.unwrap();

    let remaining = backend
        .query_range(QueryRange {
            device_id: 1,
            start: now - Duration::days(365),
            end: now,
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(remaining.len(), 2);

    retention.shutdown().await.unwrap();
}

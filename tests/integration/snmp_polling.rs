//! Integration tests for SNMP polling over real UDP sockets
//!
//! These tests verify that:
//! - The poller talks BER to an agent and stores what it answers
//! - Template resource OIDs and interface counters are collected
//! - Polled samples are evaluated immediately
//! - A silent device is skipped without a fabricated sample

use std::collections::HashMap;

use chrono::{Duration, Utc};
use netpulse::{
    actors::poller::{PollerDeps, PollerHandle, PollerSettings},
    config::PollerConfig,
    snmp::{IF_HC_IN_OCTETS, IF_HC_OUT_OCTETS, IF_NAME, SYS_DESCR, SYS_UPTIME, SnmpValue, UdpSnmpClient},
    storage::{AlertSink, MetricStore, QueryRange},
};
use std::sync::Arc;

use crate::helpers::{engine_for, memory_backend_with, spawn_snmp_agent};

fn linux_agent_values() -> HashMap<String, SnmpValue> {
    let mut values = HashMap::new();
    values.insert(
        SYS_DESCR.to_string(),
        SnmpValue::OctetString(b"Linux edge-01 6.1.0 x86_64".to_vec()),
    );
    values.insert(SYS_UPTIME.to_string(), SnmpValue::TimeTicks(123_456));
    // ssCpuIdle
    values.insert(
        "1.3.6.1.4.1.2021.11.11.0".to_string(),
        SnmpValue::Integer(8),
    );
    values.insert(format!("{IF_NAME}.2"), SnmpValue::OctetString(b"eth0".to_vec()));
    values.insert(format!("{IF_HC_IN_OCTETS}.2"), SnmpValue::Counter64(1_000));
    values.insert(format!("{IF_HC_OUT_OCTETS}.2"), SnmpValue::Counter64(2_000));
    values
}

#[tokio::test]
async fn test_poll_cycle_against_udp_agent() {
    let agent = spawn_snmp_agent(linux_agent_values()).await;
    let (backend, ids) =
        memory_backend_with(&[("edge-01", "127.0.0.1"), ("ghost", "127.0.0.2")]).await;
    let engine = engine_for(&backend);

    let mut config = PollerConfig::default();
    config.interval_secs = 3600;
    config.port = agent.port();
    config.timeout_ms = 200;
    config.retries = 0;
    config.device_timeout_secs = 2;
    for template in &mut config.templates {
        if template.name == "net-snmp" {
            template.interfaces = vec![2];
        }
    }

    let client = UdpSnmpClient::new(config.timeout(), config.retries);
    let handle = PollerHandle::spawn(
        PollerSettings::from_config(&config).unwrap(),
        PollerDeps {
            client: Arc::new(client),
            inventory: backend.clone(),
            metrics: backend.clone(),
            engine,
        },
    );

    let summary = handle.poll_now().await.unwrap();
    assert_eq!(summary.polled, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let now = Utc::now();
    let samples = backend
        .query_range(QueryRange {
            device_id: ids[0],
            start: now - Duration::minutes(1),
            end: now,
            limit: None,
        })
        .await
        .unwrap();
    let latest = samples.last().unwrap();
    assert_eq!(latest.cpu_usage, Some(92.0));
    assert!(latest.latency.unwrap() >= 0.0);

    let interfaces = backend
        .query_interface_range(ids[0], now - Duration::minutes(1), now)
        .await
        .unwrap();
    let eth0 = interfaces.last().unwrap();
    assert_eq!(eth0.if_index, 2);
    assert_eq!(eth0.if_name.as_deref(), Some("eth0"));
    assert_eq!(eth0.in_octets, Some(1_000));
    assert_eq!(eth0.out_octets, Some(2_000));

    let ghost_samples = backend
        .query_range(QueryRange {
            device_id: ids[1],
            start: now - Duration::minutes(1),
            end: now,
            limit: None,
        })
        .await
        .unwrap();
    assert!(ghost_samples.is_empty());

    // cpu 92 breaches the warning rule only, and only once across cycles
    let alerts = backend.query_recent_alerts(10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_name, "cpu_warning");
    assert_eq!(alerts[0].device_id, ids[0]);

    handle.shutdown().await.unwrap();
}

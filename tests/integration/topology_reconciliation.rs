//! Integration tests for neighbor report reconciliation
//!
//! These tests verify that:
//! - Re-reporting the same adjacency updates the existing link
//! - Reports from unknown sources change nothing

use chrono::{Duration, Utc};
use netpulse::{
    storage::{TopologyStore, schema::LinkStatus},
    topology::{Neighbor, NeighborReport, ReconcileSummary, TopologyReconciler},
};
use pretty_assertions::assert_eq;

use crate::helpers::memory_backend_with;

fn report(source: &str, remote_port: &str) -> NeighborReport {
    NeighborReport {
        source_device_ip: source.parse().unwrap(),
        neighbors: vec![Neighbor {
            local_port: "Gi0/1".to_string(),
            remote_port: remote_port.to_string(),
            remote_chassis_id: None,
            remote_system_name: Some("dist-01".to_string()),
            remote_ip: None,
            link_type: None,
        }],
    }
}

#[tokio::test]
async fn test_same_neighbor_twice_keeps_one_link() {
    let (backend, ids) = memory_backend_with(&[("core-01", "10.0.0.1"), ("dist-01", "10.0.0.2")]).await;
    let reconciler = TopologyReconciler::new(backend.clone(), backend.clone());
    let t0 = Utc::now();

    let first = reconciler.reconcile_at(&report("10.0.0.1", "Te1/1"), t0).await;
    assert_eq!(first.created, 1);

    let t1 = t0 + Duration::seconds(30);
    let second = reconciler.reconcile_at(&report("10.0.0.1", "Te1/2"), t1).await;
    assert_eq!(
        second,
        ReconcileSummary {
            created: 0,
            updated: 1,
            skipped: 0
        }
    );

    let links = backend.list_links().await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].source_id, ids[0]);
    assert_eq!(links[0].target_id, ids[1]);
    assert_eq!(links[0].target_port, "Te1/2");
    assert_eq!(links[0].status, LinkStatus::Up);
    assert!(links[0].updated_at > t0);
}

#[tokio::test]
async fn test_unknown_source_changes_nothing() {
    let (backend, _) = memory_backend_with(&[("dist-01", "10.0.0.2")]).await;
    let reconciler = TopologyReconciler::new(backend.clone(), backend.clone());

    let summary = reconciler.reconcile(&report("203.0.113.7", "Te1/1")).await;
    assert_eq!(summary, ReconcileSummary::default());
    assert!(backend.list_links().await.unwrap().is_empty());
}

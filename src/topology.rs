//! Neighbor report reconciliation
//!
//! Discovery collectors report raw adjacencies (LLDP/CDP style) keyed by the
//! reporting device's management address. The reconciler resolves both ends
//! against the inventory and upserts one link per
//! `(source, target, source port)`. Links are never deleted here.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::Device;
use crate::storage::schema::{LinkStatus, TopologyLink, UpsertOutcome};
use crate::storage::{DeviceInventory, StorageResult, TopologyStore};

const DEFAULT_LINK_TYPE: &str = "ethernet";

/// One adjacency seen on a local port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    #[serde(alias = "local_port")]
    pub local_port: String,

    #[serde(alias = "remote_port")]
    pub remote_port: String,

    #[serde(default, alias = "remote_chassis_id")]
    pub remote_chassis_id: Option<String>,

    #[serde(default, alias = "remote_system_name")]
    pub remote_system_name: Option<String>,

    /// Free text; anything that is not an IP address is ignored
    #[serde(default, alias = "remote_ip")]
    pub remote_ip: Option<String>,

    #[serde(default, alias = "link_type")]
    pub link_type: Option<String>,
}

/// Adjacencies reported by one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborReport {
    #[serde(alias = "source_device_ip")]
    pub source_device_ip: IpAddr,

    #[serde(default)]
    pub neighbors: Vec<Neighbor>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub struct TopologyReconciler {
    inventory: Arc<dyn DeviceInventory>,
    links: Arc<dyn TopologyStore>,
}

impl TopologyReconciler {
    pub fn new(inventory: Arc<dyn DeviceInventory>, links: Arc<dyn TopologyStore>) -> Self {
        Self { inventory, links }
    }

    pub async fn reconcile(&self, report: &NeighborReport) -> ReconcileSummary {
        self.reconcile_at(report, Utc::now()).await
    }

    #[instrument(skip(self, report), fields(source = %report.source_device_ip, neighbors = report.neighbors.len()))]
    pub async fn reconcile_at(
        &self,
        report: &NeighborReport,
        now: DateTime<Utc>,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        let source = match self.inventory.find_device_by_ip(report.source_device_ip).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                warn!("neighbor report from unknown device, dropping it");
                return summary;
            }
            Err(e) => {
                error!("failed to resolve reporting device: {}", e);
                return summary;
            }
        };

        for neighbor in &report.neighbors {
            let target = match self.resolve_neighbor(neighbor).await {
                Ok(Some(device)) => device,
                Ok(None) => {
                    debug!(port = %neighbor.local_port, "neighbor not in inventory, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(port = %neighbor.local_port, "failed to resolve neighbor: {}", e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let link = TopologyLink {
                id: None,
                source_id: source.id,
                target_id: target.id,
                source_port: neighbor.local_port.clone(),
                target_port: neighbor.remote_port.clone(),
                link_type: neighbor
                    .link_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LINK_TYPE.to_string()),
                status: LinkStatus::Up,
                updated_at: now,
            };

            match self.links.upsert_link(&link).await {
                Ok(UpsertOutcome::Created) => summary.created += 1,
                Ok(UpsertOutcome::Updated) => summary.updated += 1,
                Err(e) => {
                    error!(port = %link.source_port, "failed to persist link: {}", e);
                    summary.skipped += 1;
                }
            }
        }

        debug!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            "reconciled neighbor report"
        );
        summary
    }

    /// Management IP first, then system name; both exact
    async fn resolve_neighbor(&self, neighbor: &Neighbor) -> StorageResult<Option<Device>> {
        let remote_ip = neighbor
            .remote_ip
            .as_deref()
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

        if let Some(ip) = remote_ip {
            if let Some(device) = self.inventory.find_device_by_ip(ip).await? {
                return Ok(Some(device));
            }
        }

        match neighbor.remote_system_name.as_deref() {
            Some(name) if !name.is_empty() => self.inventory.find_device_by_name(name).await,
            _ => Ok(None),
        }
    }
}

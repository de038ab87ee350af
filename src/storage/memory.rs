//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running the hub with `backend: none`
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Linear scans**: Every query walks the stored rows

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::backend::{
    AlertSink, DeviceInventory, HealthStatus, InventoryAdmin, LogStore, MetricStore, QueryRange,
    RuleRepository, StorageBackend, TopologyStore,
};
use super::error::StorageResult;
use super::schema::{
    AlertEvent, DeviceSeed, RuleRecord, RuleSeed, SyslogRecord, TopologyLink, UpsertOutcome,
};
use crate::{Device, DeviceId, DeviceMetrics, DeviceStatus, InterfaceSample, MetricSample};

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryBackend {
    next_id: AtomicI64,
    devices: RwLock<Vec<Device>>,
    metrics: RwLock<Vec<(i64, MetricSample)>>,
    interfaces: RwLock<Vec<InterfaceSample>>,
    rules: RwLock<Vec<RuleRecord>>,
    alerts: RwLock<Vec<AlertEvent>>,
    syslog: RwLock<Vec<SyslogRecord>>,
    links: RwLock<Vec<TopologyLink>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Insert a rule record verbatim, keeping its (possibly malformed) conditions text
    pub async fn insert_rule_record(&self, record: RuleRecord) {
        self.rules.write().await.push(record);
    }

    /// Insert a device with an explicit id and status
    pub async fn insert_device(&self, device: Device) {
        self.devices.write().await.push(device);
    }
}

#[async_trait]
impl MetricStore for MemoryBackend {
    async fn insert_metric(&self, sample: &MetricSample) -> StorageResult<i64> {
        let id = self.next_id();
        self.metrics.write().await.push((id, sample.clone()));
        Ok(id)
    }

    async fn insert_interface_samples(&self, samples: &[InterfaceSample]) -> StorageResult<()> {
        self.interfaces.write().await.extend_from_slice(samples);
        Ok(())
    }

    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<MetricSample>> {
        let metrics = self.metrics.read().await;

        let mut results: Vec<MetricSample> = metrics
            .iter()
            .map(|(_, sample)| sample)
            .filter(|s| {
                s.device_id == query.device_id
                    && s.timestamp >= query.start
                    && s.timestamp <= query.end
            })
            .cloned()
            .collect();

        results.sort_by_key(|s| s.timestamp);
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn query_latest_per_device(
        &self,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<DeviceMetrics>> {
        let metrics = self.metrics.read().await;
        let devices = self.devices.read().await;

        let mut latest: HashMap<DeviceId, &(i64, MetricSample)> = HashMap::new();
        for entry in metrics.iter().filter(|(_, s)| s.timestamp >= since) {
            let newer = latest
                .get(&entry.1.device_id)
                .is_none_or(|cur| (entry.1.timestamp, entry.0) > (cur.1.timestamp, cur.0));
            if newer {
                latest.insert(entry.1.device_id, entry);
            }
        }

        let mut results: Vec<DeviceMetrics> = latest
            .into_values()
            .map(|(_, sample)| {
                let device = devices.iter().find(|d| d.id == sample.device_id);
                DeviceMetrics {
                    sample: sample.clone(),
                    device_name: device.map(|d| d.name.clone()),
                    device_status: device.map(|d| d.status),
                }
            })
            .collect();
        results.sort_by_key(|m| m.sample.device_id);

        Ok(results)
    }

    async fn query_interface_range(
        &self,
        device_id: DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<InterfaceSample>> {
        let mut results: Vec<InterfaceSample> = self
            .interfaces
            .read()
            .await
            .iter()
            .filter(|s| s.device_id == device_id && s.timestamp >= start && s.timestamp <= end)
            .cloned()
            .collect();
        results.sort_by_key(|s| (s.timestamp, s.if_index));
        Ok(results)
    }

    async fn cleanup_old_metrics(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut metrics = self.metrics.write().await;
        let count = metrics.len();
        metrics.retain(|(_, s)| s.timestamp >= before);
        let deleted = count - metrics.len();

        self.interfaces
            .write()
            .await
            .retain(|s| s.timestamp >= before);

        Ok(deleted)
    }
}

#[async_trait]
impl DeviceInventory for MemoryBackend {
    async fn list_snmp_devices(&self) -> StorageResult<Vec<Device>> {
        Ok(self
            .devices
            .read()
            .await
            .iter()
            .filter(|d| d.snmp_enabled)
            .cloned()
            .collect())
    }

    async fn find_device(&self, id: DeviceId) -> StorageResult<Option<Device>> {
        Ok(self
            .devices
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn find_device_by_ip(&self, ip: IpAddr) -> StorageResult<Option<Device>> {
        Ok(self
            .devices
            .read()
            .await
            .iter()
            .find(|d| d.management_ip == ip)
            .cloned())
    }

    async fn find_device_by_name(&self, name: &str) -> StorageResult<Option<Device>> {
        Ok(self
            .devices
            .read()
            .await
            .iter()
            .find(|d| d.name == name)
            .cloned())
    }
}

#[async_trait]
impl InventoryAdmin for MemoryBackend {
    async fn upsert_device(&self, seed: &DeviceSeed) -> StorageResult<DeviceId> {
        let mut devices = self.devices.write().await;

        if let Some(device) = devices.iter_mut().find(|d| d.name == seed.name) {
            device.management_ip = seed.management_ip;
            device.snmp_enabled = seed.snmp_enabled;
            device.snmp_community = seed.snmp_community.clone();
            device.snmp_version = seed.snmp_version;
            return Ok(device.id);
        }

        let id = self.next_id();
        devices.push(Device {
            id,
            name: seed.name.clone(),
            management_ip: seed.management_ip,
            snmp_enabled: seed.snmp_enabled,
            snmp_community: seed.snmp_community.clone(),
            snmp_version: seed.snmp_version,
            status: DeviceStatus::Online,
            last_seen: None,
        });
        Ok(id)
    }

    async fn upsert_rule(&self, seed: &RuleSeed) -> StorageResult<i64> {
        let mut rules = self.rules.write().await;

        if let Some(rule) = rules.iter_mut().find(|r| r.name == seed.name) {
            rule.conditions = seed.conditions.to_string();
            rule.severity = seed.severity.clone();
            rule.enabled = seed.enabled;
            return Ok(rule.id);
        }

        let id = self.next_id();
        rules.push(RuleRecord {
            id,
            name: seed.name.clone(),
            conditions: seed.conditions.to_string(),
            severity: seed.severity.clone(),
            enabled: seed.enabled,
        });
        Ok(id)
    }
}

#[async_trait]
impl RuleRepository for MemoryBackend {
    async fn load_enabled_rules(&self) -> StorageResult<Vec<RuleRecord>> {
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AlertSink for MemoryBackend {
    async fn insert_alert(&self, alert: &AlertEvent) -> StorageResult<i64> {
        let id = self.next_id();
        let mut stored = alert.clone();
        stored.id = Some(id);
        self.alerts.write().await.push(stored);
        Ok(id)
    }

    async fn query_recent_alerts(&self, limit: usize) -> StorageResult<Vec<AlertEvent>> {
        Ok(self
            .alerts
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LogStore for MemoryBackend {
    async fn insert_syslog(&self, record: &SyslogRecord) -> StorageResult<i64> {
        let id = self.next_id();
        let mut stored = record.clone();
        stored.id = Some(id);
        self.syslog.write().await.push(stored);
        Ok(id)
    }

    async fn query_recent_syslog(&self, limit: usize) -> StorageResult<Vec<SyslogRecord>> {
        Ok(self
            .syslog
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TopologyStore for MemoryBackend {
    async fn upsert_link(&self, link: &TopologyLink) -> StorageResult<UpsertOutcome> {
        let mut links = self.links.write().await;

        if let Some(existing) = links.iter_mut().find(|l| {
            l.source_id == link.source_id
                && l.target_id == link.target_id
                && l.source_port == link.source_port
        }) {
            existing.target_port = link.target_port.clone();
            existing.status = link.status;
            existing.updated_at = link.updated_at;
            return Ok(UpsertOutcome::Updated);
        }

        let mut stored = link.clone();
        stored.id = Some(self.next_id());
        links.push(stored);
        Ok(UpsertOutcome::Created)
    }

    async fn list_links(&self) -> StorageResult<Vec<TopologyLink>> {
        Ok(self.links.read().await.clone())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let mut metadata = HashMap::new();
        metadata.insert("backend".to_string(), "memory".to_string());
        metadata.insert(
            "metrics".to_string(),
            self.metrics.read().await.len().to_string(),
        );

        Ok(HealthStatus {
            healthy: true,
            message: "In-memory backend operational".to_string(),
            metadata,
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

//! Storage trait definitions
//!
//! The pipeline talks to persistence through a handful of narrow traits, one
//! per collaborator: metrics, the device inventory, rules, alerts, syslog and
//! topology. [`StorageBackend`] bundles them for the hub and the API, while
//! components such as the rule engine take only the trait they need.
//!
//! ## Thread Safety
//!
//! Implementations must be `Send + Sync` as they are shared across actor
//! tasks behind an `Arc`.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{
    AlertEvent, DeviceSeed, RuleRecord, RuleSeed, SyslogRecord, TopologyLink, UpsertOutcome,
};
use crate::{Device, DeviceId, DeviceMetrics, InterfaceSample, MetricSample};

/// Query parameters for fetching metrics within a time range
#[derive(Debug, Clone)]
pub struct QueryRange {
    pub device_id: DeviceId,

    /// Start of time range (inclusive)
    pub start: DateTime<Utc>,

    /// End of time range (inclusive)
    pub end: DateTime<Utc>,

    /// Maximum number of results to return
    pub limit: Option<usize>,
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Time series of device samples
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Append one sample; rows are never updated afterwards
    async fn insert_metric(&self, sample: &MetricSample) -> StorageResult<i64>;

    /// Append interface counter samples to the interface traffic table
    async fn insert_interface_samples(&self, samples: &[InterfaceSample]) -> StorageResult<()>;

    /// Samples of one device between start and end, oldest first
    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<MetricSample>>;

    /// The most recent sample per device with `timestamp >= since`
    ///
    /// Samples are joined with the inventory; a sample whose device is no
    /// longer in the inventory comes back with `device_name = None`.
    async fn query_latest_per_device(
        &self,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<DeviceMetrics>>;

    /// Interface samples of one device between start and end, oldest first
    async fn query_interface_range(
        &self,
        device_id: DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<InterfaceSample>>;

    /// Delete metric and interface rows older than `before`
    ///
    /// Returns the number of metric rows deleted.
    async fn cleanup_old_metrics(&self, before: DateTime<Utc>) -> StorageResult<usize>;
}

/// Read access to the managed device inventory
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    /// Devices with SNMP polling enabled
    async fn list_snmp_devices(&self) -> StorageResult<Vec<Device>>;

    async fn find_device(&self, id: DeviceId) -> StorageResult<Option<Device>>;

    async fn find_device_by_ip(&self, ip: IpAddr) -> StorageResult<Option<Device>>;

    async fn find_device_by_name(&self, name: &str) -> StorageResult<Option<Device>>;
}

/// Seeding of inventory and rules
///
/// Only used to bootstrap a deployment from configuration; regular inventory
/// management happens outside this crate.
#[async_trait]
pub trait InventoryAdmin: Send + Sync {
    /// Insert a device, or update the existing device with the same name
    async fn upsert_device(&self, seed: &DeviceSeed) -> StorageResult<DeviceId>;

    /// Insert a rule, or update the existing rule with the same name
    async fn upsert_rule(&self, seed: &RuleSeed) -> StorageResult<i64>;
}

/// Source of alert rules
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn load_enabled_rules(&self) -> StorageResult<Vec<RuleRecord>>;
}

/// Destination of fired alerts
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Persist an alert and return its id
    async fn insert_alert(&self, alert: &AlertEvent) -> StorageResult<i64>;

    /// Most recent alerts, newest first
    async fn query_recent_alerts(&self, limit: usize) -> StorageResult<Vec<AlertEvent>>;
}

/// Syslog message store
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_syslog(&self, record: &SyslogRecord) -> StorageResult<i64>;

    /// Most recent records, newest first
    async fn query_recent_syslog(&self, limit: usize) -> StorageResult<Vec<SyslogRecord>>;
}

/// Topology link store
#[async_trait]
pub trait TopologyStore: Send + Sync {
    /// Insert or update the link keyed by `(source_id, target_id, source_port)`
    ///
    /// On update only `target_port`, `status` and `updated_at` change.
    async fn upsert_link(&self, link: &TopologyLink) -> StorageResult<UpsertOutcome>;

    async fn list_links(&self) -> StorageResult<Vec<TopologyLink>>;
}

/// Everything the hub needs from one backend
#[async_trait]
pub trait StorageBackend:
    MetricStore + DeviceInventory + RuleRepository + AlertSink + LogStore + TopologyStore
{
    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database, check file access).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}

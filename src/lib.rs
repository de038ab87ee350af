pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod rules;
pub mod snmp;
pub mod storage;
pub mod suppression;
pub mod syslog;
pub mod topology;
pub mod util;

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of a managed device in the inventory
pub type DeviceId = i64;

/// Operational status of a device as reported by a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Warning,
    Error,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Warning => "warning",
            DeviceStatus::Error => "error",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "online" | "up" => Ok(DeviceStatus::Online),
            "offline" | "down" => Ok(DeviceStatus::Offline),
            "warning" => Ok(DeviceStatus::Warning),
            "error" => Ok(DeviceStatus::Error),
            other => Err(format!("unknown device status: {other}")),
        }
    }
}

/// SNMP protocol version spoken by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnmpVersion {
    V1,
    #[default]
    V2c,
}

impl SnmpVersion {
    /// Value of the `version` field on the wire
    pub fn wire_value(&self) -> i64 {
        match self {
            SnmpVersion::V1 => 0,
            SnmpVersion::V2c => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SnmpVersion::V1 => "v1",
            SnmpVersion::V2c => "v2c",
        }
    }
}

impl FromStr for SnmpVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(SnmpVersion::V1),
            "v2c" | "v2" | "2c" | "2" => Ok(SnmpVersion::V2c),
            other => Err(format!("unsupported SNMP version: {other}")),
        }
    }
}

/// A managed device, as read from the inventory
///
/// The pipeline never mutates devices; inventory CRUD lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub management_ip: IpAddr,
    pub snmp_enabled: bool,
    pub snmp_community: Option<String>,
    pub snmp_version: SnmpVersion,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

/// One timestamped measurement set for a device
///
/// Numeric fields are `None` when the collector did not measure them; a missing
/// value is never the same as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub device_id: DeviceId,
    #[serde(default)]
    pub collector_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub status: DeviceStatus,
    #[serde(default)]
    pub cpu_usage: Option<f64>,
    #[serde(default)]
    pub memory_usage: Option<f64>,
    #[serde(default)]
    pub disk_usage: Option<f64>,
    /// Round-trip latency in milliseconds
    #[serde(default)]
    pub latency: Option<f64>,
    #[serde(default)]
    pub packet_loss: Option<f64>,
}

impl MetricSample {
    /// Create a sample with no numeric fields measured
    pub fn new(device_id: DeviceId, status: DeviceStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id,
            collector_id: None,
            timestamp,
            status,
            cpu_usage: None,
            memory_usage: None,
            disk_usage: None,
            latency: None,
            packet_loss: None,
        }
    }
}

/// Traffic counters for one interface of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSample {
    pub device_id: DeviceId,
    pub if_index: u32,
    pub if_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub in_octets: Option<u64>,
    pub out_octets: Option<u64>,
}

/// A metric sample together with the device fields needed to render alerts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetrics {
    pub sample: MetricSample,

    /// `None` when the sample references a device missing from the inventory
    pub device_name: Option<String>,

    pub device_status: Option<DeviceStatus>,
}

impl DeviceMetrics {
    pub fn new(sample: MetricSample, device_name: impl Into<String>) -> Self {
        Self {
            sample,
            device_name: Some(device_name.into()),
            device_status: None,
        }
    }

    /// Name used in alert messages
    pub fn display_name(&self) -> String {
        self.device_name
            .clone()
            .unwrap_or_else(|| format!("device #{}", self.sample.device_id))
    }
}

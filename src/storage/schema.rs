//! Row types for the non-metric tables
//!
//! Metric and interface samples are the crate-level [`MetricSample`] and
//! [`InterfaceSample`]; this module holds everything else the pipeline reads
//! or writes: rules, alerts, syslog records and topology links, plus the seed
//! types the hub uses to populate an empty inventory.
//!
//! Timestamps are stored as Unix milliseconds by the SQLite backend.
//!
//! [`MetricSample`]: crate::MetricSample
//! [`InterfaceSample`]: crate::InterfaceSample

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DeviceId, SnmpVersion};

/// A rule as it sits in the rule store, before compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: i64,
    pub name: String,

    /// Raw JSON text; may be malformed
    pub conditions: String,

    pub severity: String,
    pub enabled: bool,
}

/// Lifecycle state of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Pending,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AlertStatus::Pending),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(format!("unknown alert status: {other}")),
        }
    }
}

/// A fired alert
///
/// Created by the rule engine with `id = None`; the sink assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub id: Option<i64>,

    /// `None` for built-in rules
    pub rule_id: Option<i64>,

    pub rule_name: String,
    pub device_id: DeviceId,
    pub severity: String,
    pub status: AlertStatus,
    pub message: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// One received syslog datagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyslogRecord {
    pub id: Option<i64>,

    /// Sender IP address as text
    pub hostname: String,

    pub facility: u8,
    pub severity: u8,
    pub message: String,
    pub raw: String,
    pub received_at: DateTime<Utc>,
}

/// Operational state of a topology link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    #[default]
    Up,
    Down,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Up => "up",
            LinkStatus::Down => "down",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(LinkStatus::Up),
            "down" => Ok(LinkStatus::Down),
            other => Err(format!("unknown link status: {other}")),
        }
    }
}

/// A reconciled edge between two managed devices
///
/// Unique on `(source_id, target_id, source_port)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyLink {
    pub id: Option<i64>,
    pub source_id: DeviceId,
    pub target_id: DeviceId,
    pub source_port: String,
    pub target_port: String,
    pub link_type: String,
    pub status: LinkStatus,
    pub updated_at: DateTime<Utc>,
}

/// Result of a link upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Device definition used to seed the inventory from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSeed {
    pub name: String,
    pub management_ip: IpAddr,

    #[serde(default = "default_snmp_enabled")]
    pub snmp_enabled: bool,

    #[serde(default)]
    pub snmp_community: Option<String>,

    #[serde(default)]
    pub snmp_version: SnmpVersion,
}

fn default_snmp_enabled() -> bool {
    true
}

/// Rule definition used to seed the rule store from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSeed {
    pub name: String,

    /// Written to the store verbatim
    pub conditions: Value,

    #[serde(default = "default_rule_severity")]
    pub severity: String,

    #[serde(default = "default_rule_enabled")]
    pub enabled: bool,
}

fn default_rule_severity() -> String {
    "warning".to_string()
}

fn default_rule_enabled() -> bool {
    true
}

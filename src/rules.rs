//! Alert rule model
//!
//! Stored rules carry an opaque `conditions` JSON payload of the form
//! `{ "metric": "cpuUsage", "operator": ">", "threshold": 80, "duration": 300 }`.
//! Compilation is lenient: anything that cannot be understood falls back to
//! the rule defaults instead of rejecting the rule.
//!
//! `duration` is accepted and carried on the compiled rule but evaluation does
//! not enforce a sustained breach; one breaching sample fires.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::storage::schema::RuleRecord;
use crate::{DeviceStatus, MetricSample};

const DEFAULT_METRIC: Metric = Metric::CpuUsage;
const DEFAULT_OPERATOR: Operator = Operator::Gt;
const DEFAULT_THRESHOLD: f64 = 80.0;
const DEFAULT_SEVERITY: Severity = Severity::Warning;

/// Metric a rule is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    CpuUsage,
    MemoryUsage,
    DiskUsage,
    Latency,
    PacketLoss,
    /// Synthetic metric: 0 when the device is offline, 1 otherwise
    Status,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::CpuUsage => "cpuUsage",
            Metric::MemoryUsage => "memoryUsage",
            Metric::DiskUsage => "diskUsage",
            Metric::Latency => "latency",
            Metric::PacketLoss => "packetLoss",
            Metric::Status => "status",
        }
    }

    /// Human readable label used in alert messages
    pub fn label(&self) -> &'static str {
        match self {
            Metric::CpuUsage => "CPU usage",
            Metric::MemoryUsage => "memory usage",
            Metric::DiskUsage => "disk usage",
            Metric::Latency => "latency",
            Metric::PacketLoss => "packet loss",
            Metric::Status => "status",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Latency => "ms",
            _ => "%",
        }
    }

    /// Extract this metric from a sample; `None` if it was not measured
    pub fn value_of(&self, sample: &MetricSample) -> Option<f64> {
        match self {
            Metric::CpuUsage => sample.cpu_usage,
            Metric::MemoryUsage => sample.memory_usage,
            Metric::DiskUsage => sample.disk_usage,
            Metric::Latency => sample.latency,
            Metric::PacketLoss => sample.packet_loss,
            Metric::Status => Some(match sample.status {
                DeviceStatus::Offline => 0.0,
                _ => 1.0,
            }),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpuUsage" | "cpu_usage" | "cpu" => Ok(Metric::CpuUsage),
            "memoryUsage" | "memory_usage" | "memory" => Ok(Metric::MemoryUsage),
            "diskUsage" | "disk_usage" | "disk" => Ok(Metric::DiskUsage),
            "latency" => Ok(Metric::Latency),
            "packetLoss" | "packet_loss" => Ok(Metric::PacketLoss),
            "status" => Ok(Metric::Status),
            other => Err(format!("unknown metric: {other}")),
        }
    }
}

/// Comparison applied between the observed value and the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        }
    }

    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Ge => value >= threshold,
            Operator::Le => value <= threshold,
            Operator::Eq => (value - threshold).abs() < f64::EPSILON,
            Operator::Ne => (value - threshold).abs() >= f64::EPSILON,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" | "gt" => Ok(Operator::Gt),
            "<" | "lt" => Ok(Operator::Lt),
            ">=" | "gte" => Ok(Operator::Ge),
            "<=" | "lte" => Ok(Operator::Le),
            "==" | "=" | "eq" => Ok(Operator::Eq),
            "!=" | "ne" => Ok(Operator::Ne),
            other => Err(format!("unknown operator: {other}")),
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "critical" | "crit" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Identity of a rule for suppression and persistence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleKey {
    /// Rule loaded from the rule store
    Stored(i64),

    /// Built-in fallback rule; has no durable id
    Builtin(&'static str),
}

impl RuleKey {
    /// Durable rule id, if any
    pub fn stored_id(&self) -> Option<i64> {
        match self {
            RuleKey::Stored(id) => Some(*id),
            RuleKey::Builtin(_) => None,
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKey::Stored(id) => write!(f, "rule:{id}"),
            RuleKey::Builtin(name) => write!(f, "builtin:{name}"),
        }
    }
}

/// Decoded `conditions` payload of a stored rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleCondition {
    pub metric: Option<Metric>,
    pub operator: Option<Operator>,
    pub threshold: Option<f64>,
    pub duration_secs: Option<u64>,
}

impl RuleCondition {
    /// Parse a conditions payload, treating malformed input as `{}`
    pub fn parse(raw: &str) -> Self {
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(other) => {
                warn!("rule conditions are not a JSON object ({other}), using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!("malformed rule conditions ({e}), using defaults");
                return Self::default();
            }
        };

        let metric = value
            .get("metric")
            .and_then(Value::as_str)
            .and_then(|m| m.parse().ok());
        let operator = value
            .get("operator")
            .and_then(Value::as_str)
            .and_then(|o| o.parse().ok());
        let threshold = value.get("threshold").and_then(number_like);
        let duration_secs = value
            .get("duration")
            .and_then(number_like)
            .filter(|d| *d >= 0.0)
            .map(|d| d as u64);

        Self {
            metric,
            operator,
            threshold,
            duration_secs,
        }
    }
}

/// Accept both `80` and `"80"`
fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A compiled rule ready for evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub key: RuleKey,
    pub name: String,
    pub metric: Metric,
    pub operator: Operator,
    pub threshold: f64,
    pub severity: Severity,

    /// Sustained-breach window from the rule definition; not enforced
    pub duration_secs: Option<u64>,
}

impl AlertRule {
    /// Compile a stored rule, filling anything missing with defaults
    pub fn from_record(record: &RuleRecord) -> Self {
        let condition = RuleCondition::parse(&record.conditions);
        let severity = record.severity.parse().unwrap_or_else(|e| {
            warn!(rule_id = record.id, "{e}, using {DEFAULT_SEVERITY}");
            DEFAULT_SEVERITY
        });

        Self {
            key: RuleKey::Stored(record.id),
            name: record.name.clone(),
            metric: condition.metric.unwrap_or(DEFAULT_METRIC),
            operator: condition.operator.unwrap_or(DEFAULT_OPERATOR),
            threshold: condition.threshold.unwrap_or(DEFAULT_THRESHOLD),
            severity,
            duration_secs: condition.duration_secs,
        }
    }

    /// Built-in rules are named after their key
    fn builtin(
        name: &'static str,
        metric: Metric,
        operator: Operator,
        threshold: f64,
        severity: Severity,
    ) -> Self {
        Self {
            key: RuleKey::Builtin(name),
            name: name.to_string(),
            metric,
            operator,
            threshold,
            severity,
            duration_secs: None,
        }
    }

    /// Returns the observed value if the sample breaches this rule
    pub fn breach(&self, sample: &MetricSample) -> Option<f64> {
        let value = self.metric.value_of(sample)?;
        self.operator.check(value, self.threshold).then_some(value)
    }

    /// Render the alert sentence for a breach
    pub fn render_message(&self, device_name: &str, value: f64) -> String {
        if self.metric == Metric::Status {
            return format!("{device_name} is offline");
        }

        let unit = self.metric.unit();
        format!(
            "{device_name} {} is {value:.1}{unit}, threshold {} {}{unit}",
            self.metric.label(),
            self.operator,
            self.threshold
        )
    }

    /// Structured snapshot stored next to the message
    pub fn render_details(&self, device_name: &str, value: f64) -> Value {
        json!({
            "rule": self.name,
            "metric": self.metric.as_str(),
            "value": value,
            "operator": self.operator.as_str(),
            "threshold": self.threshold,
            "unit": self.metric.unit(),
            "deviceName": device_name,
        })
    }
}

/// Rule set used when the rule store cannot be read
pub fn builtin_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::builtin(
            "cpu_warning",
            Metric::CpuUsage,
            Operator::Gt,
            80.0,
            Severity::Warning,
        ),
        AlertRule::builtin(
            "cpu_critical",
            Metric::CpuUsage,
            Operator::Gt,
            95.0,
            Severity::Critical,
        ),
        AlertRule::builtin(
            "memory_warning",
            Metric::MemoryUsage,
            Operator::Gt,
            85.0,
            Severity::Warning,
        ),
        AlertRule::builtin(
            "memory_critical",
            Metric::MemoryUsage,
            Operator::Gt,
            95.0,
            Severity::Critical,
        ),
        AlertRule::builtin(
            "latency_high",
            Metric::Latency,
            Operator::Gt,
            100.0,
            Severity::Warning,
        ),
        AlertRule::builtin(
            "packet_loss",
            Metric::PacketLoss,
            Operator::Gt,
            5.0,
            Severity::Critical,
        ),
        AlertRule::builtin(
            "device_offline",
            Metric::Status,
            Operator::Eq,
            0.0,
            Severity::Critical,
        ),
    ]
}

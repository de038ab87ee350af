use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::trace;

use crate::storage::schema::{DeviceSeed, RuleSeed};

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Delete metrics older than this many days; keep forever if unset
        #[serde(default)]
        retention_days: Option<u32>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: None,
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./netpulse.db")
}

/// A vendor OID and how to scale its raw value to percent
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct OidSpec {
    pub oid: String,
    #[serde(default)]
    pub divisor: Option<f64>,
    /// The OID reports the idle/free share; usage is `100 - value`
    #[serde(default)]
    pub complement: bool,
}

/// Resource OIDs for devices whose sysDescr matches `sys_descr_pattern`
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SnmpTemplateConfig {
    pub name: String,

    /// Regular expression matched against sysDescr
    pub sys_descr_pattern: String,

    #[serde(default)]
    pub cpu: Option<OidSpec>,
    #[serde(default)]
    pub memory: Option<OidSpec>,
    #[serde(default)]
    pub disk: Option<OidSpec>,

    /// ifIndex values whose traffic counters are sampled
    #[serde(default)]
    pub interfaces: Vec<u32>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cycle_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_snmp_port")]
    pub port: u16,
    #[serde(default = "default_community")]
    pub default_community: String,
    #[serde(default = "default_snmp_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_snmp_retries")]
    pub retries: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Budget for all requests to one device within a cycle
    #[serde(default = "default_device_timeout_secs")]
    pub device_timeout_secs: u64,
    #[serde(default = "default_templates")]
    pub templates: Vec<SnmpTemplateConfig>,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout_secs.max(1))
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_cycle_interval(),
            port: default_snmp_port(),
            default_community: default_community(),
            timeout_ms: default_snmp_timeout_ms(),
            retries: default_snmp_retries(),
            concurrency: default_concurrency(),
            device_timeout_secs: default_device_timeout_secs(),
            templates: default_templates(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cycle_interval")]
    pub interval_secs: u64,
    /// Maximum age of a sample still considered current
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_cycle_interval(),
            freshness_secs: default_freshness_secs(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_suppression_secs")]
    pub suppression_window_secs: u64,
}

impl AlertsConfig {
    pub fn suppression_window(&self) -> Duration {
        Duration::from_secs(self.suppression_window_secs)
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            suppression_window_secs: default_suppression_secs(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SyslogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_addr")]
    pub bind: IpAddr,
    #[serde(default = "crate::util::get_default_syslog_port")]
    pub port: u16,
}

impl SyslogConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind_addr(),
            port: crate::util::get_default_syslog_port(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_addr")]
    pub bind: IpAddr,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token required on every route except health
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub cors: bool,
}

impl ApiConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind_addr(),
            port: default_api_port(),
            token: None,
            cors: false,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub syslog: SyslogConfig,
    #[serde(default)]
    pub api: ApiConfig,

    /// Inventory seeded at startup, upserted by name
    #[serde(default)]
    pub devices: Vec<DeviceSeed>,

    /// Rules seeded at startup, upserted by name
    #[serde(default)]
    pub rules: Vec<RuleSeed>,
}

impl Config {
    /// Apply `NETPULSE_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = crate::util::get_syslog_port() {
            self.syslog.port = port;
        }
        if let Some(token) = crate::util::get_api_token() {
            self.api.token = Some(token);
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cycle_interval() -> u64 {
    60
}

fn default_snmp_port() -> u16 {
    161
}

fn default_community() -> String {
    "public".to_string()
}

fn default_snmp_timeout_ms() -> u64 {
    2000
}

fn default_snmp_retries() -> u32 {
    1
}

fn default_concurrency() -> usize {
    32
}

fn default_device_timeout_secs() -> u64 {
    10
}

fn default_freshness_secs() -> u64 {
    300
}

fn default_suppression_secs() -> u64 {
    300
}

fn default_bind_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_api_port() -> u16 {
    8080
}

fn default_templates() -> Vec<SnmpTemplateConfig> {
    vec![
        SnmpTemplateConfig {
            name: "cisco-ios".to_string(),
            sys_descr_pattern: "(?i)cisco".to_string(),
            // cpmCPUTotal5minRev
            cpu: Some(OidSpec {
                oid: "1.3.6.1.4.1.9.9.109.1.1.1.1.8.1".to_string(),
                divisor: None,
                complement: false,
            }),
            memory: None,
            disk: None,
            interfaces: Vec::new(),
        },
        SnmpTemplateConfig {
            name: "net-snmp".to_string(),
            sys_descr_pattern: "(?i)linux".to_string(),
            // UCD-SNMP-MIB ssCpuIdle
            cpu: Some(OidSpec {
                oid: "1.3.6.1.4.1.2021.11.11.0".to_string(),
                divisor: None,
                complement: true,
            }),
            memory: None,
            // dskPercent.1
            disk: Some(OidSpec {
                oid: "1.3.6.1.4.1.2021.9.1.9.1".to_string(),
                divisor: None,
                complement: false,
            }),
            interfaces: Vec::new(),
        },
    ]
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {path}"))?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .context("Invalid configuration file provided!")
        .inspect(|config| trace!("loaded config: {config:?}"))
}

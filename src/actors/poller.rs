//! SnmpPollerActor - Polls SNMP-enabled devices for health metrics
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → list devices → bounded fan-out of GETs → persist sample → evaluate rules
//!     ↑
//!     └─── Commands (PollNow, Shutdown)
//! ```
//!
//! Every device gets its own timeout budget, so one unreachable device never
//! delays the others. Results are handled in completion order. Only the
//! system GET must finish inside the budget; template OIDs still pending when
//! it runs out are left absent and the sample is stored anyway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use regex::Regex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval, timeout_at};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::alerts::AlertRuleEngine;
use crate::config::{OidSpec, PollerConfig, SnmpTemplateConfig};
use crate::snmp::{
    IF_HC_IN_OCTETS, IF_HC_OUT_OCTETS, IF_NAME, Oid, SYS_DESCR, SYS_UPTIME, SnmpClient,
    SnmpError, SnmpTarget, VarBind,
};
use crate::storage::{DeviceInventory, MetricStore};
use crate::{Device, DeviceMetrics, DeviceStatus, InterfaceSample, MetricSample};

use super::messages::{PollSummary, PollerCommand};

const COLLECTOR_ID: &str = "snmp-poller";

/// A resource OID with its scaling
#[derive(Debug, Clone)]
struct ResourceOid {
    oid: Oid,
    divisor: f64,
    complement: bool,
}

impl ResourceOid {
    fn compile(spec: &OidSpec) -> Result<Self> {
        let oid = spec
            .oid
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        Ok(Self {
            oid,
            divisor: spec.divisor.filter(|d| *d != 0.0).unwrap_or(1.0),
            complement: spec.complement,
        })
    }

    fn scale(&self, raw: f64) -> f64 {
        let value = raw / self.divisor;
        if self.complement { 100.0 - value } else { value }
    }
}

/// Vendor template selected by sysDescr
#[derive(Debug, Clone)]
pub struct SnmpTemplate {
    pub name: String,
    pattern: Regex,
    cpu: Option<ResourceOid>,
    memory: Option<ResourceOid>,
    disk: Option<ResourceOid>,
    interfaces: Vec<u32>,
}

impl SnmpTemplate {
    pub fn compile(config: &SnmpTemplateConfig) -> Result<Self> {
        let pattern = Regex::new(&config.sys_descr_pattern)
            .with_context(|| format!("invalid sysDescr pattern in template {}", config.name))?;
        let compile = |spec: &Option<OidSpec>| -> Result<Option<ResourceOid>> {
            spec.as_ref()
                .map(ResourceOid::compile)
                .transpose()
                .with_context(|| format!("invalid OID in template {}", config.name))
        };

        Ok(Self {
            name: config.name.clone(),
            pattern,
            cpu: compile(&config.cpu)?,
            memory: compile(&config.memory)?,
            disk: compile(&config.disk)?,
            interfaces: config.interfaces.clone(),
        })
    }

    pub fn matches(&self, sys_descr: &str) -> bool {
        self.pattern.is_match(sys_descr)
    }
}

/// Poller settings resolved from configuration
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub port: u16,
    pub default_community: String,
    pub concurrency: usize,
    pub device_timeout: Duration,
    pub templates: Vec<SnmpTemplate>,
}

impl PollerSettings {
    pub fn from_config(config: &PollerConfig) -> Result<Self> {
        let templates = config
            .templates
            .iter()
            .map(SnmpTemplate::compile)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            interval: config.interval(),
            port: config.port,
            default_community: config.default_community.clone(),
            concurrency: config.concurrency.max(1),
            device_timeout: config.device_timeout(),
            templates,
        })
    }
}

/// Collaborators the poller reads from and writes to
#[derive(Clone)]
pub struct PollerDeps {
    pub client: Arc<dyn SnmpClient>,
    pub inventory: Arc<dyn DeviceInventory>,
    pub metrics: Arc<dyn MetricStore>,
    pub engine: Arc<AlertRuleEngine>,
}

pub struct SnmpPollerActor {
    settings: PollerSettings,
    deps: PollerDeps,
    command_rx: mpsc::Receiver<PollerCommand>,
}

impl SnmpPollerActor {
    pub fn new(
        settings: PollerSettings,
        deps: PollerDeps,
        command_rx: mpsc::Receiver<PollerCommand>,
    ) -> Self {
        Self {
            settings,
            deps,
            command_rx,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first cycle starts immediately. A cycle in progress always runs to
    /// completion before a command is looked at.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting SNMP poller");

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_cycle().await {
                        error!("polling cycle failed: {:#}", e);
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PollerCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let result = self.poll_cycle().await;
                            let _ = respond_to.send(result);
                        }

                        PollerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("SNMP poller stopped");
    }

    async fn poll_cycle(&self) -> Result<PollSummary> {
        let devices = self
            .deps
            .inventory
            .list_snmp_devices()
            .await
            .context("failed to list SNMP devices")?;

        let polled = devices.len();
        let outcomes: Vec<bool> = stream::iter(devices)
            .map(|device| self.poll_device(device))
            .buffer_unordered(self.settings.concurrency)
            .collect()
            .await;

        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        let summary = PollSummary {
            polled,
            succeeded,
            failed: polled - succeeded,
        };

        info!(
            polled = summary.polled,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "polling cycle complete"
        );
        Ok(summary)
    }

    /// Poll, persist and evaluate one device; `true` if a sample was stored
    #[instrument(skip(self, device), fields(device = %device.name, ip = %device.management_ip))]
    async fn poll_device(&self, device: Device) -> bool {
        let deadline = Instant::now() + self.settings.device_timeout;
        let target = self.target_for(&device);

        let (mut sample, sys_descr) =
            match timeout_at(deadline, self.collect_system(&target, &device)).await {
                Ok(Ok(collected)) => collected,
                Ok(Err(e)) => {
                    warn!("SNMP poll failed: {}", e);
                    return false;
                }
                Err(_) => {
                    warn!("SNMP poll exceeded {:?}", self.settings.device_timeout);
                    return false;
                }
            };

        let mut interfaces = Vec::new();
        if let Some(template) = self.template_for(&sys_descr) {
            debug!(template = %template.name, "using template");
            let timestamp = sample.timestamp;
            let optional = async {
                self.collect_resources(&target, template, &mut sample).await;
                self.collect_interfaces(&target, &device, template, timestamp, &mut interfaces)
                    .await;
            };
            if timeout_at(deadline, optional).await.is_err() {
                warn!(
                    "template OIDs exceeded {:?}, storing partial sample",
                    self.settings.device_timeout
                );
            }
        }

        if let Err(e) = self.deps.metrics.insert_metric(&sample).await {
            error!("failed to persist sample: {}", e);
            return false;
        }

        if !interfaces.is_empty() {
            if let Err(e) = self.deps.metrics.insert_interface_samples(&interfaces).await {
                error!("failed to persist interface samples: {}", e);
            }
        }

        let input = DeviceMetrics {
            sample,
            device_name: Some(device.name.clone()),
            device_status: Some(device.status),
        };
        self.deps.engine.evaluate(&input).await;

        true
    }

    fn target_for(&self, device: &Device) -> SnmpTarget {
        SnmpTarget::new(
            SocketAddr::new(device.management_ip, self.settings.port),
            device
                .snmp_community
                .clone()
                .unwrap_or_else(|| self.settings.default_community.clone()),
            device.snmp_version,
        )
    }

    fn template_for(&self, sys_descr: &str) -> Option<&SnmpTemplate> {
        self.settings
            .templates
            .iter()
            .find(|t| t.matches(sys_descr))
    }

    /// GET sysDescr and sysUpTime; the round trip becomes the latency
    async fn collect_system(
        &self,
        target: &SnmpTarget,
        device: &Device,
    ) -> Result<(MetricSample, String), SnmpError> {
        let system_oids = [oid(SYS_DESCR), oid(SYS_UPTIME)];
        let started = Instant::now();
        let system = self.deps.client.get(target, &system_oids).await?;
        let latency = started.elapsed().as_secs_f64() * 1000.0;

        let sys_descr = system
            .first()
            .and_then(|vb| vb.value.as_text())
            .unwrap_or_default();
        trace!(sys_descr = %sys_descr, "device answered");

        let mut sample = MetricSample::new(device.id, DeviceStatus::Online, Utc::now());
        sample.collector_id = Some(COLLECTOR_ID.to_string());
        sample.latency = Some(latency);

        Ok((sample, sys_descr))
    }

    /// Fill cpu/memory/disk; fields stay absent when the agent cannot answer
    async fn collect_resources(
        &self,
        target: &SnmpTarget,
        template: &SnmpTemplate,
        sample: &mut MetricSample,
    ) {
        let wanted: Vec<&ResourceOid> = [&template.cpu, &template.memory, &template.disk]
            .into_iter()
            .flatten()
            .collect();
        if wanted.is_empty() {
            return;
        }

        let oids: Vec<Oid> = wanted.iter().map(|r| r.oid.clone()).collect();
        let varbinds = match self.deps.client.get(target, &oids).await {
            Ok(varbinds) => varbinds,
            Err(e) => {
                debug!("resource OIDs unavailable: {}", e);
                return;
            }
        };

        let read = |resource: &Option<ResourceOid>| -> Option<f64> {
            let resource = resource.as_ref()?;
            let raw = find_value(&varbinds, &resource.oid)?;
            Some(resource.scale(raw))
        };

        sample.cpu_usage = read(&template.cpu);
        sample.memory_usage = read(&template.memory);
        sample.disk_usage = read(&template.disk);
    }

    /// Sample the template's interfaces into `samples` one GET at a time
    async fn collect_interfaces(
        &self,
        target: &SnmpTarget,
        device: &Device,
        template: &SnmpTemplate,
        timestamp: chrono::DateTime<Utc>,
        samples: &mut Vec<InterfaceSample>,
    ) {
        for &if_index in &template.interfaces {
            let oids = [
                oid(IF_NAME).child(if_index),
                oid(IF_HC_IN_OCTETS).child(if_index),
                oid(IF_HC_OUT_OCTETS).child(if_index),
            ];

            match self.deps.client.get(target, &oids).await {
                Ok(varbinds) if varbinds.iter().all(|vb| vb.value.is_exception()) => {
                    debug!(if_index, "interface not present on agent");
                }
                Ok(varbinds) => samples.push(InterfaceSample {
                    device_id: device.id,
                    if_index,
                    if_name: varbinds.first().and_then(|vb| vb.value.as_text()),
                    timestamp,
                    in_octets: varbinds.get(1).and_then(|vb| vb.value.as_u64()),
                    out_octets: varbinds.get(2).and_then(|vb| vb.value.as_u64()),
                }),
                Err(e) => debug!(if_index, "interface counters unavailable: {}", e),
            }
        }
    }
}

fn oid(text: &str) -> Oid {
    // the MIB constants are valid dotted OIDs
    text.parse().unwrap_or_else(|_| Oid::new(Vec::new()))
}

fn find_value(varbinds: &[VarBind], oid: &Oid) -> Option<f64> {
    let varbind = varbinds.iter().find(|vb| &vb.oid == oid)?;
    if varbind.value.is_exception() {
        trace!(%oid, value = ?varbind.value, "OID not supported by agent");
        return None;
    }
    varbind.value.as_f64()
}

/// Handle for controlling a SnmpPollerActor
#[derive(Clone)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,
}

impl PollerHandle {
    pub fn spawn(settings: PollerSettings, deps: PollerDeps) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SnmpPollerActor::new(settings, deps, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a cycle immediately and wait for its summary
    pub async fn poll_now(&self) -> Result<PollSummary> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")?
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PollerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

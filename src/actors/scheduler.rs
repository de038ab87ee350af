//! AlertSchedulerActor - Periodic rule evaluation over fresh samples
//!
//! Every cycle reloads the rule set, collects the latest sample per device
//! inside the freshness window and hands the batch to the rule engine.
//!
//! A device that stopped reporting has no fresh sample and is simply absent
//! from the batch, so the status rule never sees it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::AlertRuleEngine;
use crate::config::SchedulerConfig;
use crate::storage::MetricStore;

use super::messages::{CycleSummary, SchedulerCommand};

pub struct AlertSchedulerActor {
    interval: Duration,
    freshness: Duration,
    metrics: Arc<dyn MetricStore>,
    engine: Arc<AlertRuleEngine>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl AlertSchedulerActor {
    pub fn new(
        config: &SchedulerConfig,
        metrics: Arc<dyn MetricStore>,
        engine: Arc<AlertRuleEngine>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            interval: config.interval(),
            freshness: config.freshness(),
            metrics,
            engine,
            command_rx,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting alert scheduler");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle(Utc::now()).await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SchedulerCommand::RunNow { respond_to } => {
                            debug!("received RunNow command");
                            let summary = self.run_cycle(Utc::now()).await;
                            let _ = respond_to.send(summary);
                        }

                        SchedulerCommand::Shutdown => {
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

        debug!("alert scheduler stopped");
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> CycleSummary {
        let mut summary = CycleSummary::default();

        if let Err(e) = self.engine.load_rules().await {
            warn!("{}, evaluating with built-in rules", e);
            summary.degraded = true;
        }

        let since = now
            - chrono::Duration::from_std(self.freshness).unwrap_or(chrono::Duration::zero());
        let batch = match self.metrics.query_latest_per_device(since).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("failed to query latest metrics: {}", e);
                return summary;
            }
        };

        summary.devices = batch.len();
        summary.alerts = self.engine.process_metrics_batch_at(&batch, now).await.len();

        info!(
            devices = summary.devices,
            alerts = summary.alerts,
            degraded = summary.degraded,
            "evaluation cycle complete"
        );
        summary
    }
}

/// Handle for controlling an AlertSchedulerActor
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn spawn(
        config: &SchedulerConfig,
        metrics: Arc<dyn MetricStore>,
        engine: Arc<AlertRuleEngine>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = AlertSchedulerActor::new(config, metrics, engine, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    pub async fn run_now(&self) -> Result<CycleSummary> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

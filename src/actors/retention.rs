//! RetentionActor - Deletes metric rows older than the retention period
//!
//! Runs one cleanup right after startup and then once a day. A failed
//! cleanup is logged; the next run tries again.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::storage::MetricStore;

use super::messages::RetentionCommand;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60); // 24 hours

pub struct RetentionActor {
    retention_days: u32,
    metrics: Arc<dyn MetricStore>,
    command_rx: mpsc::Receiver<RetentionCommand>,
}

impl RetentionActor {
    pub fn new(
        retention_days: u32,
        metrics: Arc<dyn MetricStore>,
        command_rx: mpsc::Receiver<RetentionCommand>,
    ) -> Self {
        Self {
            retention_days,
            metrics,
            command_rx,
        }
    }

    #[instrument(skip(self), fields(retention_days = self.retention_days))]
    pub async fn run(mut self) {
        debug!("starting retention actor");

        // the first tick completes immediately
        let mut cleanup_interval = time::interval(CLEANUP_INTERVAL);

        loop {
            tokio::select! {
                _ = cleanup_interval.tick() => {
                    if let Err(e) = self.run_cleanup().await {
                        error!("failed to cleanup old metrics: {:#}", e);
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        RetentionCommand::RunNow { respond_to } => {
                            let _ = respond_to.send(self.run_cleanup().await);
                        }

                        RetentionCommand::Shutdown => {
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

        debug!("retention actor stopped");
    }

    async fn run_cleanup(&self) -> Result<usize> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(self.retention_days as i64);

        let deleted = self
            .metrics
            .cleanup_old_metrics(cutoff)
            .await
            .context("cleanup query failed")?;

        info!("retention cleanup complete: deleted {} old metrics", deleted);
        Ok(deleted)
    }
}

/// Handle for controlling a RetentionActor
#[derive(Clone)]
pub struct RetentionHandle {
    sender: mpsc::Sender<RetentionCommand>,
}

impl RetentionHandle {
    pub fn spawn(retention_days: u32, metrics: Arc<dyn MetricStore>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = RetentionActor::new(retention_days, metrics, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    pub async fn run_now(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RetentionCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive response")?
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(RetentionCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

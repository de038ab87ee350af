use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use netpulse::{
    actors::{
        poller::{PollerDeps, PollerHandle, PollerSettings},
        retention::RetentionHandle,
        scheduler::SchedulerHandle,
        syslog::SyslogHandle,
    },
    alerts::AlertRuleEngine,
    config::{Config, StorageConfig, read_config_file},
    snmp::UdpSnmpClient,
    storage::{InventoryAdmin, StorageBackend, memory::MemoryBackend},
    suppression::InMemorySuppressionStore,
    util,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let level = LevelFilter::from_level(util::get_log_level());
    let filter = filter::Targets::new().with_targets(vec![
        ("netpulse", level),
        ("netpulse_hub", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = read_config_file(&args.file)?;
    config.apply_env_overrides();

    match config.storage.clone() {
        StorageConfig::None => {
            warn!("running without persistent storage, data is lost on restart");
            run(config, Arc::new(MemoryBackend::new()), None).await
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite {
            path,
            retention_days,
        } => {
            let backend = netpulse::storage::sqlite::SqliteBackend::new(&path)
                .await
                .with_context(|| format!("failed to open database {}", path.display()))?;
            run(config, Arc::new(backend), retention_days).await
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

/// Seed the backend, start every enabled component and wait for ctrl-c
#[instrument(skip_all)]
async fn run<B>(config: Config, backend: Arc<B>, retention_days: Option<u32>) -> anyhow::Result<()>
where
    B: StorageBackend + InventoryAdmin + 'static,
{
    seed(&config, backend.as_ref()).await?;

    let engine = Arc::new(
        AlertRuleEngine::new(
            backend.clone(),
            backend.clone(),
            Arc::new(InMemorySuppressionStore::new()),
        )
        .with_suppression_window(config.alerts.suppression_window()),
    );
    match engine.load_rules().await {
        Ok(count) => info!("loaded {} alert rules", count),
        Err(e) => warn!("{}, starting with built-in rules", e),
    }

    spawn_alert_logger(&engine);

    let poller = if config.poller.enabled {
        let settings = PollerSettings::from_config(&config.poller)?;
        let client = UdpSnmpClient::new(config.poller.timeout(), config.poller.retries);
        Some(PollerHandle::spawn(
            settings,
            PollerDeps {
                client: Arc::new(client),
                inventory: backend.clone(),
                metrics: backend.clone(),
                engine: engine.clone(),
            },
        ))
    } else {
        debug!("SNMP poller disabled");
        None
    };

    let scheduler = config
        .scheduler
        .enabled
        .then(|| SchedulerHandle::spawn(&config.scheduler, backend.clone(), engine.clone()));

    // a bind failure only disables syslog ingestion
    let syslog = if config.syslog.enabled {
        match SyslogHandle::spawn(config.syslog.socket_addr(), backend.clone()).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("syslog listener not started: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let retention = retention_days.map(|days| RetentionHandle::spawn(days, backend.clone()));

    #[cfg(feature = "api")]
    {
        use netpulse::api::{ApiServerConfig, ApiState, spawn_api_server};
        use netpulse::topology::TopologyReconciler;

        if config.api.enabled {
            let reconciler = Arc::new(TopologyReconciler::new(backend.clone(), backend.clone()));
            let state = ApiState::new(backend.clone(), engine.clone(), reconciler);
            spawn_api_server(ApiServerConfig::from(&config.api), state)
                .await
                .context("failed to start API server")?;
        }
    }

    info!("hub running, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    if let Some(poller) = poller {
        poller.shutdown().await.ok();
    }
    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await.ok();
    }
    if let Some(syslog) = syslog {
        syslog.shutdown().await.ok();
    }
    if let Some(retention) = retention {
        retention.shutdown().await.ok();
    }

    backend.close().await?;
    Ok(())
}

async fn seed<B: InventoryAdmin>(config: &Config, backend: &B) -> anyhow::Result<()> {
    for device in &config.devices {
        backend
            .upsert_device(device)
            .await
            .with_context(|| format!("failed to seed device {}", device.name))?;
    }
    for rule in &config.rules {
        backend
            .upsert_rule(rule)
            .await
            .with_context(|| format!("failed to seed rule {}", rule.name))?;
    }

    if !config.devices.is_empty() || !config.rules.is_empty() {
        debug!(
            "seeded {} devices and {} rules",
            config.devices.len(),
            config.rules.len()
        );
    }
    Ok(())
}

/// Log every fired alert; stands in for a notification channel
fn spawn_alert_logger(engine: &AlertRuleEngine) {
    let mut alerts = engine.subscribe();

    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => info!(
                    device_id = alert.device_id,
                    severity = %alert.severity,
                    "ALERT {}",
                    alert.message
                ),
                Err(RecvError::Lagged(skipped)) => warn!("alert logger skipped {} alerts", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

//! Threshold rule engine
//!
//! The engine holds a compiled rule set, evaluates device samples against it
//! and persists an [`AlertEvent`] for every breach that is not suppressed.
//! Fired alerts are also published on a broadcast channel for whatever
//! delivers notifications.
//!
//! The rule set is replaced wholesale on reload; evaluations that already
//! hold the previous set finish with it.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::DeviceMetrics;
use crate::rules::{AlertRule, builtin_rules};
use crate::storage::schema::{AlertEvent, AlertStatus};
use crate::storage::{AlertSink, RuleRepository, StorageError};
use crate::suppression::{SuppressionKey, SuppressionStore};

/// Minimum time between two alerts for the same device and rule
pub const SUPPRESSION_WINDOW: Duration = Duration::from_secs(5 * 60);

const ALERT_CHANNEL_CAPACITY: usize = 256;

/// Rule loading failed; the built-in rule set is active
#[derive(Debug)]
pub enum RuleLoadError {
    Store(StorageError),
}

impl fmt::Display for RuleLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleLoadError::Store(err) => {
                write!(f, "failed to load alert rules, using built-in rules: {}", err)
            }
        }
    }
}

impl std::error::Error for RuleLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuleLoadError::Store(err) => Some(err),
        }
    }
}

impl From<StorageError> for RuleLoadError {
    fn from(err: StorageError) -> Self {
        RuleLoadError::Store(err)
    }
}

pub struct AlertRuleEngine {
    repository: Arc<dyn RuleRepository>,
    sink: Arc<dyn AlertSink>,
    suppression: Arc<dyn SuppressionStore>,
    rules: RwLock<Arc<Vec<AlertRule>>>,
    window: Duration,
    events: broadcast::Sender<AlertEvent>,
}

impl AlertRuleEngine {
    /// Create an engine with the built-in rules active until the first load
    pub fn new(
        repository: Arc<dyn RuleRepository>,
        sink: Arc<dyn AlertSink>,
        suppression: Arc<dyn SuppressionStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);

        Self {
            repository,
            sink,
            suppression,
            rules: RwLock::new(Arc::new(builtin_rules())),
            window: SUPPRESSION_WINDOW,
            events,
        }
    }

    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn suppression_window(&self) -> Duration {
        self.window
    }

    /// Snapshot of the active rule set
    pub fn rules(&self) -> Arc<Vec<AlertRule>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace_rules(&self, rules: Vec<AlertRule>) {
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(rules);
    }

    /// Reload enabled rules from the rule store
    ///
    /// On failure the built-in rules are installed and the error is returned
    /// so the caller can report degraded mode. An empty enabled set is a
    /// valid result and disables alerting.
    #[instrument(skip(self))]
    pub async fn load_rules(&self) -> Result<usize, RuleLoadError> {
        match self.repository.load_enabled_rules().await {
            Ok(records) => {
                let rules: Vec<AlertRule> = records.iter().map(AlertRule::from_record).collect();
                let count = rules.len();
                self.replace_rules(rules);
                debug!("loaded {} alert rules", count);
                Ok(count)
            }
            Err(e) => {
                self.replace_rules(builtin_rules());
                Err(e.into())
            }
        }
    }

    /// Receive every alert this engine persists
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.events.subscribe()
    }

    pub async fn evaluate(&self, input: &DeviceMetrics) -> Vec<AlertEvent> {
        self.evaluate_at(input, Utc::now()).await
    }

    /// Evaluate one sample as of `now`
    ///
    /// Returns the alerts that fired and were persisted.
    #[instrument(skip(self, input), fields(device_id = input.sample.device_id))]
    pub async fn evaluate_at(&self, input: &DeviceMetrics, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let rules = self.rules();
        let device_name = input.display_name();
        let mut fired = Vec::new();

        for rule in rules.iter() {
            let Some(value) = rule.breach(&input.sample) else {
                continue;
            };

            let key = SuppressionKey::new(input.sample.device_id, rule.key.clone());
            if !self.suppression.try_acquire(&key, now, self.window).await {
                if let Some(last) = self.suppression.last_fired(&key).await {
                    debug!(rule = %rule.key, last_fired = %last, "alert suppressed");
                }
                continue;
            }

            let mut event = AlertEvent {
                id: None,
                rule_id: rule.key.stored_id(),
                rule_name: rule.name.clone(),
                device_id: input.sample.device_id,
                severity: rule.severity.to_string(),
                status: AlertStatus::Pending,
                message: rule.render_message(&device_name, value),
                details: rule.render_details(&device_name, value),
                created_at: now,
            };

            match self.sink.insert_alert(&event).await {
                Ok(id) => {
                    event.id = Some(id);
                    info!(
                        device_id = event.device_id,
                        rule = %rule.key,
                        severity = %event.severity,
                        "{}",
                        event.message
                    );
                    // nobody listening is fine
                    let _ = self.events.send(event.clone());
                    fired.push(event);
                }
                Err(e) => {
                    error!(rule = %rule.key, "failed to persist alert: {}", e);
                    self.suppression.release(&key, now).await;
                }
            }
        }

        fired
    }

    /// Evaluate a batch; one item's failures never stop the rest
    pub async fn process_metrics_batch(&self, batch: &[DeviceMetrics]) -> Vec<AlertEvent> {
        self.process_metrics_batch_at(batch, Utc::now()).await
    }

    pub async fn process_metrics_batch_at(
        &self,
        batch: &[DeviceMetrics],
        now: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        let mut all = Vec::new();
        for input in batch {
            if input.device_name.is_none() {
                warn!(
                    device_id = input.sample.device_id,
                    "sample references a device missing from the inventory"
                );
            }
            all.extend(self.evaluate_at(input, now).await);
        }
        all
    }
}

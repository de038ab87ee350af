//! API shared state

use std::sync::Arc;

use crate::alerts::AlertRuleEngine;
use crate::storage::StorageBackend;
use crate::topology::TopologyReconciler;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Backend for samples, inventory lookups, alerts and links
    pub backend: Arc<dyn StorageBackend>,

    /// Engine evaluating pushed samples and reloading rules
    pub engine: Arc<AlertRuleEngine>,

    /// Reconciler for pushed neighbor reports
    pub reconciler: Arc<TopologyReconciler>,
}

impl ApiState {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        engine: Arc<AlertRuleEngine>,
        reconciler: Arc<TopologyReconciler>,
    ) -> Self {
        Self {
            backend,
            engine,
            reconciler,
        }
    }
}

//! Alert suppression state
//!
//! A `(device, rule)` pair that fired is silenced until the suppression window
//! has elapsed. The state is injected into the rule engine so that a shared
//! cache can replace the in-process map for multi-instance deployments.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::trace;

use crate::DeviceId;
use crate::rules::RuleKey;

/// Identity of a suppression entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuppressionKey {
    pub device_id: DeviceId,
    pub rule: RuleKey,
}

impl SuppressionKey {
    pub fn new(device_id: DeviceId, rule: RuleKey) -> Self {
        Self { device_id, rule }
    }
}

/// Storage for last-fired timestamps
#[async_trait]
pub trait SuppressionStore: Send + Sync {
    /// Claim the right to fire `key` at `now`
    ///
    /// Returns `false` if the key fired less than `window` ago. On success
    /// the last-fired time is set to `now` in the same atomic step.
    async fn try_acquire(&self, key: &SuppressionKey, now: DateTime<Utc>, window: Duration)
    -> bool;

    /// Undo a claim made at `fired_at`
    ///
    /// Has no effect if the key was claimed again in the meantime.
    async fn release(&self, key: &SuppressionKey, fired_at: DateTime<Utc>);

    async fn last_fired(&self, key: &SuppressionKey) -> Option<DateTime<Utc>>;

    /// Forget every entry
    async fn clear(&self);
}

/// Single-process suppression map; lost on restart
///
/// Entries older than the window are swept at most once per window, so keys
/// of retired devices and deleted rules do not accumulate.
#[derive(Debug, Default)]
pub struct InMemorySuppressionStore {
    entries: Mutex<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    last_fired: HashMap<SuppressionKey, DateTime<Utc>>,
    swept_at: Option<DateTime<Utc>>,
}

impl Entries {
    fn sweep(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        if self
            .swept_at
            .is_some_and(|at| now.signed_duration_since(at) < window)
        {
            return;
        }

        let before = self.last_fired.len();
        self.last_fired
            .retain(|_, last| now.signed_duration_since(*last) < window);
        self.swept_at = Some(now);

        let dropped = before - self.last_fired.len();
        if dropped > 0 {
            trace!(dropped, "expired suppression entries dropped");
        }
    }
}

impl InMemorySuppressionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.last_fired.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.last_fired.is_empty()
    }
}

#[async_trait]
impl SuppressionStore for InMemorySuppressionStore {
    async fn try_acquire(
        &self,
        key: &SuppressionKey,
        now: DateTime<Utc>,
        window: Duration,
    ) -> bool {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let mut entries = self.entries.lock().await;
        entries.sweep(now, window);

        let suppressed = entries
            .last_fired
            .get(key)
            .is_some_and(|last| now.signed_duration_since(*last) < window);
        if suppressed {
            return false;
        }

        entries.last_fired.insert(key.clone(), now);
        true
    }

    async fn release(&self, key: &SuppressionKey, fired_at: DateTime<Utc>) {
        let mut entries = self.entries.lock().await;
        if entries.last_fired.get(key) == Some(&fired_at) {
            entries.last_fired.remove(key);
        }
    }

    async fn last_fired(&self, key: &SuppressionKey) -> Option<DateTime<Utc>> {
        self.entries.lock().await.last_fired.get(key).copied()
    }

    async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.last_fired.clear();
        entries.swept_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(300);

    fn key(device_id: DeviceId) -> SuppressionKey {
        SuppressionKey::new(device_id, RuleKey::Stored(1))
    }

    #[tokio::test]
    async fn test_window_suppresses_then_expires() {
        let store = InMemorySuppressionStore::new();
        let t0 = Utc::now();

        assert!(store.try_acquire(&key(1), t0, WINDOW).await);
        assert!(
            !store
                .try_acquire(&key(1), t0 + chrono::Duration::seconds(299), WINDOW)
                .await
        );
        assert!(
            store
                .try_acquire(&key(1), t0 + chrono::Duration::seconds(300), WINDOW)
                .await
        );
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = InMemorySuppressionStore::new();
        let now = Utc::now();

        assert!(store.try_acquire(&key(1), now, WINDOW).await);
        assert!(store.try_acquire(&key(2), now, WINDOW).await);
        assert!(
            store
                .try_acquire(
                    &SuppressionKey::new(1, RuleKey::Builtin("cpu_warning")),
                    now,
                    WINDOW
                )
                .await
        );
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_release_only_matching_claim() {
        let store = InMemorySuppressionStore::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(400);

        assert!(store.try_acquire(&key(1), t0, WINDOW).await);
        assert!(store.try_acquire(&key(1), t1, WINDOW).await);

        // stale release leaves the newer claim in place
        store.release(&key(1), t0).await;
        assert_eq!(store.last_fired(&key(1)).await, Some(t1));

        store.release(&key(1), t1).await;
        assert_eq!(store.last_fired(&key(1)).await, None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept() {
        let store = InMemorySuppressionStore::new();
        let t0 = Utc::now();

        assert!(store.try_acquire(&key(1), t0, WINDOW).await);
        assert!(
            store
                .try_acquire(&key(2), t0 + chrono::Duration::seconds(200), WINDOW)
                .await
        );
        assert_eq!(store.len().await, 2);

        // key 1 has aged out, key 2 is still inside its window
        let t2 = t0 + chrono::Duration::seconds(400);
        assert!(store.try_acquire(&key(3), t2, WINDOW).await);
        assert_eq!(store.len().await, 2);
        assert_eq!(store.last_fired(&key(1)).await, None);
        assert!(!store.try_acquire(&key(2), t2, WINDOW).await);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemorySuppressionStore::new();
        store.try_acquire(&key(1), Utc::now(), WINDOW).await;
        store.clear().await;
        assert!(store.is_empty().await);
    }
}

//! Session reconciler - request-scoped entitlement snapshots.
//!
//! A unit of work starts by loading a read-only snapshot of the user's
//! entitlement; the snapshot is an explicit value threaded through the
//! request, never ambient state, and never built from anything the
//! client claims about its own tier. Stale snapshots are refreshed from
//! the store so tier changes applied asynchronously by the webhook
//! processor become visible without re-authentication.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlement::{EntitlementRecord, SubscriptionTier, TierConfig};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{EntitlementStore, StoreError};

/// Default snapshot age before a re-read.
const DEFAULT_MAX_SNAPSHOT_AGE: Duration = Duration::from_secs(300);

/// Read-only view of a user's entitlement for one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementSnapshot {
    pub user_id: UserId,
    pub tier: SubscriptionTier,
    pub config: TierConfig,
    pub external_customer_id: Option<String>,
    pub grace_until: Option<Timestamp>,
    loaded_at: Timestamp,
}

impl EntitlementSnapshot {
    fn from_record(record: EntitlementRecord, loaded_at: Timestamp) -> Self {
        Self {
            user_id: record.user_id,
            tier: record.tier,
            config: TierConfig::for_tier(record.tier),
            external_customer_id: record.external_customer_id,
            grace_until: record.grace_until,
            loaded_at,
        }
    }

    /// Snapshot for a user the store has never seen: Freemium defaults.
    fn freemium(user_id: UserId, loaded_at: Timestamp) -> Self {
        Self {
            user_id,
            tier: SubscriptionTier::Freemium,
            config: TierConfig::for_tier(SubscriptionTier::Freemium),
            external_customer_id: None,
            grace_until: None,
            loaded_at,
        }
    }

    /// When this snapshot was read from the store.
    pub fn loaded_at(&self) -> Timestamp {
        self.loaded_at
    }

    /// Whether the snapshot is older than `max_age` at `now`.
    pub fn is_stale(&self, now: Timestamp, max_age: Duration) -> bool {
        now.duration_since(&self.loaded_at).num_milliseconds() > max_age.as_millis() as i64
    }
}

/// Bridges request context with the entitlement store at session
/// boundaries. Read-only: any usage mutation goes through the quota gate.
pub struct SessionReconciler {
    store: Arc<dyn EntitlementStore>,
    max_snapshot_age: Duration,
}

impl SessionReconciler {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self {
            store,
            max_snapshot_age: DEFAULT_MAX_SNAPSHOT_AGE,
        }
    }

    /// Overrides how old a snapshot may get before `refreshed` re-reads.
    pub fn with_max_snapshot_age(mut self, max_age: Duration) -> Self {
        self.max_snapshot_age = max_age;
        self
    }

    /// Loads a fresh snapshot at the start of a unit of work.
    pub async fn snapshot(&self, user_id: &UserId) -> Result<EntitlementSnapshot, StoreError> {
        let now = Timestamp::now();
        let snapshot = match self.store.get(user_id).await? {
            Some(record) => EntitlementSnapshot::from_record(record, now),
            None => EntitlementSnapshot::freemium(user_id.clone(), now),
        };
        Ok(snapshot)
    }

    /// Returns the snapshot unchanged while fresh, or a re-read once it
    /// crosses the configured age.
    pub async fn refreshed(
        &self,
        snapshot: EntitlementSnapshot,
    ) -> Result<EntitlementSnapshot, StoreError> {
        if !snapshot.is_stale(Timestamp::now(), self.max_snapshot_age) {
            return Ok(snapshot);
        }
        self.snapshot(&snapshot.user_id).await
    }
}

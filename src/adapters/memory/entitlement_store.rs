//! In-memory implementation of the EntitlementStore port.
//!
//! Used in tests and local development. A single mutex over all state
//! gives every operation per-key atomicity trivially: the
//! check-and-increment and mutate+mark-applied units each run entirely
//! inside one lock acquisition, mirroring what the Postgres adapter gets
//! from conditional updates.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::entitlement::{EntitlementMutation, EntitlementRecord};
use crate::domain::foundation::{EventId, Timestamp, UsageDay, UserId};
use crate::ports::{
    ApplyOutcome, EntitlementStore, RejectReason, StoreError, UsageDecision,
};

#[derive(Default)]
struct State {
    records: HashMap<UserId, EntitlementRecord>,
    applied_events: HashSet<EventId>,
    usage: HashMap<(UserId, UsageDay), u32>,
}

/// In-memory entitlement store.
#[derive(Default)]
pub struct InMemoryEntitlementStore {
    state: Mutex<State>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value for assertions in tests.
    pub async fn usage_count(&self, user_id: &UserId, day: UsageDay) -> u32 {
        let state = self.state.lock().await;
        state
            .usage
            .get(&(user_id.clone(), day))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<EntitlementRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.records.get(user_id).cloned())
    }

    async fn apply_event(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        event_at: Timestamp,
        mutation: &EntitlementMutation,
    ) -> Result<ApplyOutcome, StoreError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.applied_events.contains(event_id) {
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        // Only activation may create the record; anything else stays
        // unapplied so redelivery can succeed later.
        let can_create = matches!(mutation, EntitlementMutation::Activate { .. });
        if !can_create && !state.records.contains_key(user_id) {
            return Ok(ApplyOutcome::Rejected(RejectReason::NoRecordForUser));
        }

        let record = state
            .records
            .entry(user_id.clone())
            .or_insert_with(|| EntitlementRecord::freemium(user_id.clone(), event_at));

        let change = record.apply(event_id, event_at, mutation);
        state.applied_events.insert(event_id.clone());

        Ok(ApplyOutcome::Applied(change))
    }

    async fn increment_usage(
        &self,
        user_id: &UserId,
        day: UsageDay,
        limit: u32,
    ) -> Result<UsageDecision, StoreError> {
        let mut state = self.state.lock().await;
        let count = state.usage.entry((user_id.clone(), day)).or_insert(0);

        if *count < limit {
            *count += 1;
            Ok(UsageDecision::Allowed { count: *count })
        } else {
            Ok(UsageDecision::Denied)
        }
    }
}

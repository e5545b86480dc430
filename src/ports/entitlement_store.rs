//! EntitlementStore port - sole owner of persisted entitlement state.
//!
//! The store exposes exactly three operations: a read, the atomic
//! mutate+mark-applied unit used by the webhook processor, and the atomic
//! usage increment used by the quota gate. No other component writes tier
//! state, and neither keyed operation may be decomposed into a caller-side
//! read-then-write: both must behave correctly under concurrent
//! invocation for the same key.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entitlement::{AppliedChange, EntitlementMutation, EntitlementRecord};
use crate::domain::foundation::{EventId, Timestamp, UsageDay, UserId};

/// Store failure. Always treated as transient by callers: webhook
/// processing leaves the event unacknowledged, quota checks fail closed.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Why an event application was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A non-activating event referenced a user with no record.
    NoRecordForUser,
}

/// Result of the atomic mutate+mark-applied unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// First application of this event id; the mutation (possibly a
    /// no-op for out-of-order events) and the applied-mark committed
    /// together.
    Applied(AppliedChange),
    /// This event id was applied before; nothing was re-executed.
    AlreadyApplied,
    /// The event could not be applied against current state.
    Rejected(RejectReason),
}

/// Result of the atomic usage increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageDecision {
    /// A slot was consumed; `count` is the counter value after the
    /// increment, guaranteed `<= limit`.
    Allowed { count: u32 },
    /// The counter was already at the limit; nothing was mutated.
    Denied,
}

/// Port for the persisted entitlement state.
///
/// Implementations must make `apply_event` and `increment_usage` single
/// atomic operations per key (database conditional updates, or one lock
/// in memory) so that concurrent calls for the same user or event id
/// serialize at the store rather than racing in callers.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Reads a user's entitlement record.
    ///
    /// Returns `None` for users that have never completed a checkout;
    /// callers treat that as Freemium.
    async fn get(&self, user_id: &UserId) -> Result<Option<EntitlementRecord>, StoreError>;

    /// Applies a webhook-derived mutation exactly once per event id.
    ///
    /// Activation events create the record if absent; other mutations
    /// against an absent record are `Rejected`. An event older than the
    /// record's last applied timestamp is recorded as applied without
    /// touching the tier (last-writer-by-timestamp-wins).
    async fn apply_event(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        event_at: Timestamp,
        mutation: &EntitlementMutation,
    ) -> Result<ApplyOutcome, StoreError>;

    /// Atomically increments the (user, day) counter if below `limit`.
    ///
    /// The counter is lazily created at zero for a day's first call, so
    /// the midnight rollover needs no reset job. Two simultaneous calls
    /// for the last remaining slot must not both be allowed.
    async fn increment_usage(
        &self,
        user_id: &UserId,
        day: UsageDay,
        limit: u32,
    ) -> Result<UsageDecision, StoreError>;
}

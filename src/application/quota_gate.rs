//! Quota gate - atomic daily plan-slot enforcement.
//!
//! The gate is the single check point between a user action and a
//! consumed quota slot. The read-compare-increment is one atomic store
//! primitive, so N logically simultaneous calls with K remaining slots
//! grant exactly min(N, K). Grants are consumed at check time: a caller
//! that is cancelled or fails after `Allowed` does not return its slot.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlement::{SubscriptionTier, TierConfig};
use crate::domain::foundation::{UsageDay, UserId};
use crate::ports::{EntitlementStore, UsageDecision};

/// Default bound on a single store call.
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Why a quota claim was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The daily limit for the user's tier is exhausted. A normal
    /// business outcome, not an error.
    DailyLimitReached,
    /// The store could not answer in time; the gate fails closed rather
    /// than risk an undetected double grant.
    StoreUnavailable,
}

/// Outcome of a quota claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// A slot was consumed; `remaining` slots are left for today.
    Allowed { remaining: u32 },
    /// No slot was consumed.
    Denied { reason: DenialReason },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }

    /// User-facing message, deliberately non-technical and distinct
    /// between the limit being reached and a system problem.
    pub fn user_message(&self) -> &'static str {
        match self {
            QuotaDecision::Allowed { .. } => "Plan slot reserved.",
            QuotaDecision::Denied {
                reason: DenialReason::DailyLimitReached,
            } => "You've reached today's plan limit. Upgrade or try again tomorrow.",
            QuotaDecision::Denied {
                reason: DenialReason::StoreUnavailable,
            } => "We couldn't check your plan quota just now. Please try again.",
        }
    }
}

/// Gate enforcing per-user, per-day plan quotas.
pub struct QuotaGate {
    store: Arc<dyn EntitlementStore>,
    store_timeout: Duration,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Overrides the store call bound.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Claims one plan slot for `user_id` on `today`.
    ///
    /// The tier comes from the session snapshot, never from the client.
    /// On any uncertainty (timeout, store failure) the gate fails
    /// closed and denies without mutation.
    pub async fn check_and_increment(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
        today: UsageDay,
    ) -> QuotaDecision {
        let limit = TierConfig::for_tier(tier).daily_plan_limit;

        let result = tokio::time::timeout(
            self.store_timeout,
            self.store.increment_usage(user_id, today, limit),
        )
        .await;

        match result {
            Ok(Ok(UsageDecision::Allowed { count })) => QuotaDecision::Allowed {
                remaining: limit.saturating_sub(count),
            },
            // Expected business outcome; not an error, not logged as one.
            Ok(Ok(UsageDecision::Denied)) => QuotaDecision::Denied {
                reason: DenialReason::DailyLimitReached,
            },
            Ok(Err(err)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %err,
                    "quota store call failed, failing closed"
                );
                QuotaDecision::Denied {
                    reason: DenialReason::StoreUnavailable,
                }
            }
            Err(_elapsed) => {
                tracing::warn!(
                    user_id = %user_id,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "quota store call timed out, failing closed"
                );
                QuotaDecision::Denied {
                    reason: DenialReason::StoreUnavailable,
                }
            }
        }
    }
}

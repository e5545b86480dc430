//! Entitlement record aggregate.
//!
//! One record per user, owned exclusively by the entitlement store and
//! mutated only through applied webhook events. Created on the first
//! successful checkout event, updated by every later applied event, never
//! deleted: cancellation transitions the tier, it does not erase history.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EventId, Timestamp, UserId};

use super::{SubscriptionTier, TierConfig};

/// Policy controlling when a cancellation takes effect.
///
/// The payment provider's own semantics are ambiguous here, so the choice
/// is configuration rather than a hard-coded guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    /// Downgrade to Freemium the moment the cancellation event applies.
    Immediate,
    /// Keep the paid tier until the current billing period ends; the
    /// period end lands in `grace_until` and the provider's later
    /// deletion event (or the external deadline sweep) performs the
    /// downgrade.
    #[default]
    PeriodEnd,
}

/// Mutation derived from a webhook event, applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementMutation {
    /// Checkout completed: grant the purchased tier.
    Activate {
        tier: SubscriptionTier,
        external_customer_id: Option<String>,
        external_subscription_id: String,
    },
    /// Subscription canceled at the provider.
    Cancel {
        policy: CancellationPolicy,
        period_end: Option<Timestamp>,
    },
    /// A renewal charge failed: start the grace window.
    MarkPaymentFailed { grace_until: Timestamp },
}

/// Result of applying a mutation to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedChange {
    pub previous_tier: SubscriptionTier,
    pub new_tier: SubscriptionTier,
    /// True when the event's timestamp was older than the last applied
    /// event and the mutation was therefore skipped (the event id is
    /// still recorded so redelivery stays a no-op).
    pub out_of_order: bool,
}

impl AppliedChange {
    /// Whether the tier actually moved.
    pub fn tier_changed(&self) -> bool {
        self.previous_tier != self.new_tier
    }

    /// Whether this change upgraded the user into a paid tier.
    pub fn is_upgrade(&self) -> bool {
        self.tier_changed() && self.new_tier.is_paid()
    }
}

/// Persisted entitlement state for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub user_id: UserId,
    pub tier: SubscriptionTier,
    /// When the current tier took effect (the applying event's timestamp).
    pub tier_effective_at: Timestamp,
    pub external_customer_id: Option<String>,
    pub external_subscription_id: Option<String>,
    pub last_applied_event_id: Option<EventId>,
    /// Timestamp of the newest applied event. Ordering guard: a tier
    /// change only lands if the incoming event is not older than this.
    pub last_applied_event_at: Option<Timestamp>,
    /// Deadline for an unresolved payment failure or a period-end
    /// cancellation. The downgrade on expiry is a separate sweep.
    pub grace_until: Option<Timestamp>,
}

impl EntitlementRecord {
    /// Initial Freemium record for a user the store has never seen.
    pub fn freemium(user_id: UserId, now: Timestamp) -> Self {
        Self {
            user_id,
            tier: SubscriptionTier::Freemium,
            tier_effective_at: now,
            external_customer_id: None,
            external_subscription_id: None,
            last_applied_event_id: None,
            last_applied_event_at: None,
            grace_until: None,
        }
    }

    /// Configuration bound to the record's current tier.
    pub fn tier_config(&self) -> TierConfig {
        TierConfig::for_tier(self.tier)
    }

    /// Whether an unresolved grace deadline has passed.
    pub fn grace_expired(&self, now: Timestamp) -> bool {
        self.grace_until.map(|g| now.is_after(&g)).unwrap_or(false)
    }

    /// Applies a mutation under the last-writer-by-timestamp-wins rule.
    ///
    /// An event older than `last_applied_event_at` leaves the record
    /// untouched but is reported as applied-out-of-order so the caller
    /// can still acknowledge it. Events are ordered by their provider
    /// timestamp, never by arrival order.
    pub fn apply(
        &mut self,
        event_id: &EventId,
        event_at: Timestamp,
        mutation: &EntitlementMutation,
    ) -> AppliedChange {
        if let Some(last) = self.last_applied_event_at {
            if event_at.is_before(&last) {
                return AppliedChange {
                    previous_tier: self.tier,
                    new_tier: self.tier,
                    out_of_order: true,
                };
            }
        }

        let previous_tier = self.tier;

        match mutation {
            EntitlementMutation::Activate {
                tier,
                external_customer_id,
                external_subscription_id,
            } => {
                self.tier = *tier;
                self.tier_effective_at = event_at;
                if external_customer_id.is_some() {
                    self.external_customer_id = external_customer_id.clone();
                }
                self.external_subscription_id = Some(external_subscription_id.clone());
                self.grace_until = None;
            }
            EntitlementMutation::Cancel { policy, period_end } => match policy {
                CancellationPolicy::Immediate => {
                    self.tier = SubscriptionTier::Freemium;
                    self.tier_effective_at = event_at;
                    self.grace_until = None;
                }
                CancellationPolicy::PeriodEnd => {
                    self.grace_until = *period_end;
                }
            },
            EntitlementMutation::MarkPaymentFailed { grace_until } => {
                self.grace_until = Some(*grace_until);
            }
        }

        self.last_applied_event_id = Some(event_id.clone());
        self.last_applied_event_at = Some(event_at);

        AppliedChange {
            previous_tier,
            new_tier: self.tier,
            out_of_order: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn event(n: u32) -> EventId {
        EventId::new(format!("evt_{}", n)).unwrap()
    }

    fn activate_premium() -> EntitlementMutation {
        EntitlementMutation::Activate {
            tier: SubscriptionTier::Premium,
            external_customer_id: Some("cus_123".to_string()),
            external_subscription_id: "sub_123".to_string(),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Activation
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn activation_sets_tier_and_provider_ids() {
        let mut record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        let at = Timestamp::from_unix_secs(1_000);

        let change = record.apply(&event(1), at, &activate_premium());

        assert_eq!(record.tier, SubscriptionTier::Premium);
        assert_eq!(record.tier_effective_at, at);
        assert_eq!(record.external_customer_id.as_deref(), Some("cus_123"));
        assert_eq!(record.external_subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(record.last_applied_event_id, Some(event(1)));
        assert_eq!(record.last_applied_event_at, Some(at));
        assert!(change.tier_changed());
        assert!(change.is_upgrade());
    }

    #[test]
    fn activation_clears_grace_deadline() {
        let mut record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        record.grace_until = Some(Timestamp::from_unix_secs(500));

        record.apply(&event(1), Timestamp::from_unix_secs(1_000), &activate_premium());

        assert!(record.grace_until.is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // Timestamp ordering guard
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn older_event_does_not_regress_tier() {
        let mut record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        record.apply(&event(2), Timestamp::from_unix_secs(2_000), &activate_premium());

        // A cancellation that the provider created *before* the
        // activation arrives late.
        let change = record.apply(
            &event(1),
            Timestamp::from_unix_secs(1_000),
            &EntitlementMutation::Cancel {
                policy: CancellationPolicy::Immediate,
                period_end: None,
            },
        );

        assert!(change.out_of_order);
        assert!(!change.tier_changed());
        assert_eq!(record.tier, SubscriptionTier::Premium);
        // The guard timestamp did not move backwards either.
        assert_eq!(
            record.last_applied_event_at,
            Some(Timestamp::from_unix_secs(2_000))
        );
    }

    #[test]
    fn equal_timestamp_is_applied() {
        let mut record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        let at = Timestamp::from_unix_secs(1_000);
        record.apply(&event(1), at, &activate_premium());

        let change = record.apply(
            &event(2),
            at,
            &EntitlementMutation::Cancel {
                policy: CancellationPolicy::Immediate,
                period_end: None,
            },
        );

        assert!(!change.out_of_order);
        assert_eq!(record.tier, SubscriptionTier::Freemium);
    }

    // ══════════════════════════════════════════════════════════════
    // Cancellation policies
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn immediate_cancellation_downgrades_now() {
        let mut record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        record.apply(&event(1), Timestamp::from_unix_secs(1_000), &activate_premium());

        let change = record.apply(
            &event(2),
            Timestamp::from_unix_secs(2_000),
            &EntitlementMutation::Cancel {
                policy: CancellationPolicy::Immediate,
                period_end: None,
            },
        );

        assert_eq!(record.tier, SubscriptionTier::Freemium);
        assert!(change.tier_changed());
        assert!(!change.is_upgrade());
        // History survives the downgrade.
        assert_eq!(record.external_subscription_id.as_deref(), Some("sub_123"));
    }

    #[test]
    fn period_end_cancellation_keeps_tier_and_sets_deadline() {
        let mut record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        record.apply(&event(1), Timestamp::from_unix_secs(1_000), &activate_premium());

        let period_end = Timestamp::from_unix_secs(5_000);
        let change = record.apply(
            &event(2),
            Timestamp::from_unix_secs(2_000),
            &EntitlementMutation::Cancel {
                policy: CancellationPolicy::PeriodEnd,
                period_end: Some(period_end),
            },
        );

        assert_eq!(record.tier, SubscriptionTier::Premium);
        assert!(!change.tier_changed());
        assert_eq!(record.grace_until, Some(period_end));
    }

    // ══════════════════════════════════════════════════════════════
    // Payment failure grace period
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn payment_failure_marks_grace_without_downgrading() {
        let mut record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        record.apply(&event(1), Timestamp::from_unix_secs(1_000), &activate_premium());

        let deadline = Timestamp::from_unix_secs(3_000);
        record.apply(
            &event(2),
            Timestamp::from_unix_secs(2_000),
            &EntitlementMutation::MarkPaymentFailed {
                grace_until: deadline,
            },
        );

        assert_eq!(record.tier, SubscriptionTier::Premium);
        assert_eq!(record.grace_until, Some(deadline));
    }

    #[test]
    fn grace_expiry_is_detectable() {
        let mut record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        record.grace_until = Some(Timestamp::from_unix_secs(1_000));

        assert!(!record.grace_expired(Timestamp::from_unix_secs(999)));
        assert!(record.grace_expired(Timestamp::from_unix_secs(1_001)));
    }

    #[test]
    fn freemium_record_has_freemium_limits() {
        let record = EntitlementRecord::freemium(user(), Timestamp::from_unix_secs(0));
        assert_eq!(record.tier_config().daily_plan_limit, 1);
    }
}

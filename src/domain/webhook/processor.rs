//! Webhook event processor.
//!
//! Consumes verified provider events and applies them to the entitlement
//! store exactly once. Idempotency and ordering live in the store's
//! atomic `apply_event`; this layer maps provider payloads to mutations
//! and fires the one-shot side effects that follow a real application.
//!
//! There is no internal retry loop: if the atomic unit cannot complete,
//! the event is never acknowledged and the provider's own redelivery
//! recovers it.

use std::sync::Arc;

use crate::domain::entitlement::{CancellationPolicy, EntitlementMutation, TierConfig};
use crate::domain::foundation::{EventId, Timestamp, UserId};
use crate::ports::{ApplyOutcome, EntitlementStore, RejectReason, UpgradeNotifier};

use super::errors::WebhookError;
use super::event::{EntitlementEvent, ProviderEvent};

/// Outcome of processing a verified event, as acknowledged upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    /// Business effects executed and durably recorded.
    Applied,
    /// Duplicate delivery of an already-applied event; acknowledged
    /// without re-executing business effects.
    AlreadyApplied,
    /// Verified but intentionally without business effects (unknown
    /// event type).
    Acknowledged,
}

/// Applies verified provider events to the entitlement store.
pub struct WebhookProcessor {
    store: Arc<dyn EntitlementStore>,
    notifier: Arc<dyn UpgradeNotifier>,
    cancellation_policy: CancellationPolicy,
    grace_period_days: i64,
}

impl WebhookProcessor {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        notifier: Arc<dyn UpgradeNotifier>,
        cancellation_policy: CancellationPolicy,
        grace_period_days: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            cancellation_policy,
            grace_period_days,
        }
    }

    /// Processes one verified event.
    ///
    /// # Returns
    ///
    /// - `Ok(WebhookAck::Applied)` - mutation and mark-applied committed
    /// - `Ok(WebhookAck::AlreadyApplied)` - idempotent no-op
    /// - `Ok(WebhookAck::Acknowledged)` - unknown type, nothing to do
    /// - `Err(_)` - rejection or transient failure; the HTTP layer maps
    ///   it to a status that tells the provider whether to redeliver
    pub async fn process(&self, event: &ProviderEvent) -> Result<WebhookAck, WebhookError> {
        let event_id = EventId::new(&event.id)
            .map_err(|_| WebhookError::MalformedPayload("empty event id".to_string()))?;
        let event_at = event.created_at();

        let entitlement_event = match event.to_entitlement_event()? {
            Some(extracted) => extracted,
            None => {
                tracing::info!(
                    event_id = %event_id,
                    event_type = %event.event_type,
                    "acknowledging unhandled webhook event type"
                );
                return Ok(WebhookAck::Acknowledged);
            }
        };

        let (user_id, mutation, email) = self.to_mutation(entitlement_event, event_at);

        let outcome = self
            .store
            .apply_event(&event_id, &user_id, event_at, &mutation)
            .await?;

        match outcome {
            ApplyOutcome::Applied(change) => {
                tracing::info!(
                    event_id = %event_id,
                    user_id = %user_id,
                    event_type = %event.event_type,
                    previous_tier = %change.previous_tier,
                    new_tier = %change.new_tier,
                    out_of_order = change.out_of_order,
                    "webhook event applied"
                );

                // Side effects run only on the delivery that actually
                // applied the event, so duplicates cannot repeat them.
                let notifications_enabled =
                    TierConfig::for_tier(change.new_tier).email_notifications_enabled;
                if change.is_upgrade() && notifications_enabled {
                    self.notifier
                        .tier_upgraded(&user_id, email.as_deref(), change.new_tier)
                        .await;
                }

                Ok(WebhookAck::Applied)
            }
            ApplyOutcome::AlreadyApplied => {
                tracing::debug!(
                    event_id = %event_id,
                    "duplicate webhook delivery, already applied"
                );
                Ok(WebhookAck::AlreadyApplied)
            }
            ApplyOutcome::Rejected(RejectReason::NoRecordForUser) => {
                Err(WebhookError::EntitlementMissing(user_id.to_string()))
            }
        }
    }

    /// Maps an entitlement event to the store mutation it implies.
    fn to_mutation(
        &self,
        event: EntitlementEvent,
        event_at: Timestamp,
    ) -> (UserId, EntitlementMutation, Option<String>) {
        match event {
            EntitlementEvent::SubscriptionActivated {
                user_id,
                tier,
                external_customer_id,
                external_subscription_id,
                email,
            } => (
                user_id,
                EntitlementMutation::Activate {
                    tier,
                    external_customer_id,
                    external_subscription_id,
                },
                email,
            ),
            EntitlementEvent::SubscriptionCanceled { user_id, period_end } => (
                user_id,
                EntitlementMutation::Cancel {
                    policy: self.cancellation_policy,
                    period_end,
                },
                None,
            ),
            EntitlementEvent::PaymentFailed { user_id } => (
                user_id,
                EntitlementMutation::MarkPaymentFailed {
                    grace_until: event_at.add_days(self.grace_period_days),
                },
                None,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryEntitlementStore;
    use crate::domain::entitlement::SubscriptionTier;
    use crate::domain::webhook::event::ProviderEventBuilder;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // ══════════════════════════════════════════════════════════════
    // Test infrastructure
    // ══════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct RecordingNotifier {
        notifications: AtomicU32,
        last_email: Mutex<Option<String>>,
    }

    impl RecordingNotifier {
        fn count(&self) -> u32 {
            self.notifications.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpgradeNotifier for RecordingNotifier {
        async fn tier_upgraded(
            &self,
            _user_id: &UserId,
            email: Option<&str>,
            _tier: SubscriptionTier,
        ) {
            self.notifications.fetch_add(1, Ordering::SeqCst);
            *self.last_email.lock().unwrap() = email.map(String::from);
        }
    }

    fn processor(
        store: Arc<InMemoryEntitlementStore>,
        notifier: Arc<RecordingNotifier>,
        policy: CancellationPolicy,
    ) -> WebhookProcessor {
        WebhookProcessor::new(store, notifier, policy, 7)
    }

    fn checkout_event(event_id: &str, created: i64) -> ProviderEvent {
        ProviderEventBuilder::new()
            .id(event_id)
            .created(created)
            .object(json!({
                "customer": "cus_123",
                "subscription": "sub_123",
                "metadata": { "user_id": "user-1", "tier": "premium" },
                "customer_details": { "email": "user@example.com" }
            }))
            .build()
    }

    fn cancel_event(event_id: &str, created: i64) -> ProviderEvent {
        ProviderEventBuilder::new()
            .id(event_id)
            .event_type("customer.subscription.deleted")
            .created(created)
            .object(json!({
                "metadata": { "user_id": "user-1" },
                "current_period_end": created + 86_400
            }))
            .build()
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Application
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn checkout_event_activates_premium() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store.clone(), notifier, CancellationPolicy::PeriodEnd);

        let ack = processor
            .process(&checkout_event("evt_1", 1_000))
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::Applied);
        let record = store.get(&user()).await.unwrap().unwrap();
        assert_eq!(record.tier, SubscriptionTier::Premium);
        assert_eq!(record.external_subscription_id.as_deref(), Some("sub_123"));
    }

    #[tokio::test]
    async fn upgrade_sends_exactly_one_notification() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store, notifier.clone(), CancellationPolicy::PeriodEnd);

        processor
            .process(&checkout_event("evt_1", 1_000))
            .await
            .unwrap();

        assert_eq!(notifier.count(), 1);
        assert_eq!(
            notifier.last_email.lock().unwrap().as_deref(),
            Some("user@example.com")
        );
    }

    #[tokio::test]
    async fn redelivery_is_acknowledged_without_side_effects() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store.clone(), notifier.clone(), CancellationPolicy::PeriodEnd);

        processor
            .process(&checkout_event("evt_1", 1_000))
            .await
            .unwrap();
        let record_after_first = store.get(&user()).await.unwrap().unwrap();

        let ack = processor
            .process(&checkout_event("evt_1", 1_000))
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::AlreadyApplied);
        assert_eq!(store.get(&user()).await.unwrap().unwrap(), record_after_first);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn out_of_order_cancellation_does_not_regress_tier() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store.clone(), notifier, CancellationPolicy::Immediate);

        // Activation created at t=2000 arrives first...
        processor
            .process(&checkout_event("evt_2", 2_000))
            .await
            .unwrap();
        // ...then a cancellation the provider created earlier, at t=1000.
        let ack = processor
            .process(&cancel_event("evt_1", 1_000))
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::Applied);
        let record = store.get(&user()).await.unwrap().unwrap();
        assert_eq!(record.tier, SubscriptionTier::Premium);
    }

    #[tokio::test]
    async fn immediate_policy_downgrades_on_cancel() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store.clone(), notifier.clone(), CancellationPolicy::Immediate);

        processor
            .process(&checkout_event("evt_1", 1_000))
            .await
            .unwrap();
        processor
            .process(&cancel_event("evt_2", 2_000))
            .await
            .unwrap();

        let record = store.get(&user()).await.unwrap().unwrap();
        assert_eq!(record.tier, SubscriptionTier::Freemium);
        // Downgrades never notify.
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn period_end_policy_keeps_tier_until_deadline() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store.clone(), notifier, CancellationPolicy::PeriodEnd);

        processor
            .process(&checkout_event("evt_1", 1_000))
            .await
            .unwrap();
        processor
            .process(&cancel_event("evt_2", 2_000))
            .await
            .unwrap();

        let record = store.get(&user()).await.unwrap().unwrap();
        assert_eq!(record.tier, SubscriptionTier::Premium);
        assert_eq!(
            record.grace_until,
            Some(Timestamp::from_unix_secs(2_000 + 86_400))
        );
    }

    #[tokio::test]
    async fn payment_failure_marks_grace_period() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store.clone(), notifier, CancellationPolicy::PeriodEnd);

        processor
            .process(&checkout_event("evt_1", 1_000))
            .await
            .unwrap();

        let failure = ProviderEventBuilder::new()
            .id("evt_2")
            .event_type("invoice.payment_failed")
            .created(2_000)
            .object(json!({ "metadata": { "user_id": "user-1" } }))
            .build();
        processor.process(&failure).await.unwrap();

        let record = store.get(&user()).await.unwrap().unwrap();
        assert_eq!(record.tier, SubscriptionTier::Premium);
        assert_eq!(
            record.grace_until,
            Some(Timestamp::from_unix_secs(2_000).add_days(7))
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Failure scoping
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store.clone(), notifier, CancellationPolicy::PeriodEnd);

        let event = ProviderEventBuilder::new()
            .id("evt_ping")
            .event_type("customer.created")
            .build();

        let ack = processor.process(&event).await.unwrap();

        assert_eq!(ack, WebhookAck::Acknowledged);
        assert!(store.get(&user()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_for_unknown_user_is_transient() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store, notifier, CancellationPolicy::Immediate);

        let result = processor.process(&cancel_event("evt_1", 1_000)).await;

        match result {
            Err(err @ WebhookError::EntitlementMissing(_)) => assert!(err.is_retryable()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_without_state_change() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = processor(store.clone(), notifier, CancellationPolicy::PeriodEnd);

        let event = ProviderEventBuilder::new()
            .id("evt_bad")
            .object(json!({ "customer": "cus_123" }))
            .build();

        let result = processor.process(&event).await;

        assert!(matches!(result, Err(WebhookError::MissingField(_))));
        assert!(store.get(&user()).await.unwrap().is_none());
        // A later, well-formed event for the same user is unaffected.
        processor
            .process(&checkout_event("evt_good", 1_000))
            .await
            .unwrap();
        assert!(store.get(&user()).await.unwrap().is_some());
    }
}

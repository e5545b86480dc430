//! Payment-provider webhook event types.
//!
//! Structures for parsing provider payloads. Only fields relevant to
//! entitlement reconciliation are captured; the rest of the provider's
//! schema is ignored.

use serde::{Deserialize, Serialize};

use crate::domain::entitlement::SubscriptionTier;
use crate::domain::foundation::{Timestamp, UserId};

use super::errors::WebhookError;

/// Provider webhook event envelope (Stripe-shaped).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the provider created the event (Unix timestamp).
    /// This, not arrival order, decides application order.
    pub created: i64,

    /// Object containing event-specific data.
    pub data: ProviderEventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEventData {
    /// The object that triggered the event (polymorphic by event type).
    pub object: serde_json::Value,
}

/// Known provider event types relevant to entitlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventType {
    /// Checkout session completed successfully.
    CheckoutSessionCompleted,
    /// Customer subscription was deleted/canceled.
    CustomerSubscriptionDeleted,
    /// A renewal invoice failed to charge.
    InvoicePaymentFailed,
    /// Unknown or unhandled event type.
    Unknown,
}

impl ProviderEventType {
    /// Parse event type from the provider's string form.
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            _ => Self::Unknown,
        }
    }

    /// The provider's string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::Unknown => "unknown",
        }
    }
}

/// Per-event processing state.
///
/// `Received → Verified → Applied`, or `Received → Rejected` when the
/// signature or payload fails checks. `Applied` and `Rejected` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Received,
    Verified,
    Applied,
    Rejected,
}

impl ProcessingState {
    /// Whether a transition to `target` is legal.
    pub fn can_transition_to(&self, target: ProcessingState) -> bool {
        use ProcessingState::*;
        matches!(
            (self, target),
            (Received, Verified) | (Received, Rejected) | (Verified, Applied) | (Verified, Rejected)
        )
    }

    /// Lowercase name for structured log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Received => "received",
            ProcessingState::Verified => "verified",
            ProcessingState::Applied => "applied",
            ProcessingState::Rejected => "rejected",
        }
    }
}

/// Entitlement-level meaning extracted from a verified provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementEvent {
    SubscriptionActivated {
        user_id: UserId,
        tier: SubscriptionTier,
        external_customer_id: Option<String>,
        external_subscription_id: String,
        /// Checkout email, used for the one-shot upgrade notification.
        email: Option<String>,
    },
    SubscriptionCanceled {
        user_id: UserId,
        period_end: Option<Timestamp>,
    },
    PaymentFailed {
        user_id: UserId,
    },
}

/// Checkout session object carried by `checkout.session.completed`.
#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    metadata: EventMetadata,
    customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

/// Subscription object carried by `customer.subscription.deleted`.
#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    #[serde(default)]
    metadata: EventMetadata,
    current_period_end: Option<i64>,
}

/// Invoice object carried by `invoice.payment_failed`.
#[derive(Debug, Deserialize)]
struct InvoiceObject {
    #[serde(default)]
    metadata: EventMetadata,
}

/// Metadata our checkout flow stamps on sessions and subscriptions.
#[derive(Debug, Default, Deserialize)]
struct EventMetadata {
    user_id: Option<String>,
    tier: Option<SubscriptionTier>,
}

impl EventMetadata {
    fn user_id(&self) -> Result<UserId, WebhookError> {
        let raw = self
            .user_id
            .as_deref()
            .ok_or(WebhookError::MissingMetadata("user_id"))?;
        UserId::new(raw).map_err(|_| WebhookError::MissingMetadata("user_id"))
    }
}

impl ProviderEvent {
    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> ProviderEventType {
        ProviderEventType::parse(&self.event_type)
    }

    /// The provider's creation time for this event.
    pub fn created_at(&self) -> Timestamp {
        Timestamp::from_unix_secs(self.created)
    }

    /// Extracts the entitlement-level meaning of this event.
    ///
    /// Returns `Ok(None)` for event types we do not handle; those are
    /// acknowledged without business effects. Payloads of a known type
    /// that are missing required fields are malformed and rejected.
    pub fn to_entitlement_event(&self) -> Result<Option<EntitlementEvent>, WebhookError> {
        match self.parsed_type() {
            ProviderEventType::CheckoutSessionCompleted => {
                let session: CheckoutSessionObject = self.deserialize_object()?;
                let subscription = session
                    .subscription
                    .ok_or(WebhookError::MissingField("subscription"))?;
                let tier = session.metadata.tier.unwrap_or(SubscriptionTier::Premium);
                Ok(Some(EntitlementEvent::SubscriptionActivated {
                    user_id: session.metadata.user_id()?,
                    tier,
                    external_customer_id: session.customer,
                    external_subscription_id: subscription,
                    email: session.customer_details.and_then(|d| d.email),
                }))
            }
            ProviderEventType::CustomerSubscriptionDeleted => {
                let subscription: SubscriptionObject = self.deserialize_object()?;
                Ok(Some(EntitlementEvent::SubscriptionCanceled {
                    user_id: subscription.metadata.user_id()?,
                    period_end: subscription.current_period_end.map(Timestamp::from_unix_secs),
                }))
            }
            ProviderEventType::InvoicePaymentFailed => {
                let invoice: InvoiceObject = self.deserialize_object()?;
                Ok(Some(EntitlementEvent::PaymentFailed {
                    user_id: invoice.metadata.user_id()?,
                }))
            }
            ProviderEventType::Unknown => Ok(None),
        }
    }

    fn deserialize_object<T: serde::de::DeserializeOwned>(&self) -> Result<T, WebhookError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }
}

/// Builder for creating test ProviderEvent instances.
#[cfg(test)]
pub struct ProviderEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    livemode: bool,
}

#[cfg(test)]
impl Default for ProviderEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            created: 1_704_067_200,
            object: serde_json::json!({}),
            livemode: false,
        }
    }
}

#[cfg(test)]
impl ProviderEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> ProviderEvent {
        ProviderEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: ProviderEventData {
                object: self.object,
            },
            livemode: self.livemode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ══════════════════════════════════════════════════════════════
    // Envelope deserialization
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {} },
            "livemode": false
        }"#;

        let event: ProviderEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(
            event.parsed_type(),
            ProviderEventType::CheckoutSessionCompleted
        );
        assert_eq!(event.created_at().as_unix_secs(), 1704067200);
    }

    #[test]
    fn livemode_defaults_to_false_when_absent() {
        let json = r#"{
            "id": "evt_x",
            "type": "ping",
            "created": 0,
            "data": { "object": {} }
        }"#;

        let event: ProviderEvent = serde_json::from_str(json).unwrap();
        assert!(!event.livemode);
    }

    #[test]
    fn event_type_roundtrip() {
        for t in [
            ProviderEventType::CheckoutSessionCompleted,
            ProviderEventType::CustomerSubscriptionDeleted,
            ProviderEventType::InvoicePaymentFailed,
        ] {
            assert_eq!(ProviderEventType::parse(t.as_str()), t);
        }
    }

    #[test]
    fn unrecognized_type_parses_as_unknown() {
        assert_eq!(
            ProviderEventType::parse("customer.created"),
            ProviderEventType::Unknown
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Processing state machine
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn received_can_become_verified_or_rejected() {
        assert!(ProcessingState::Received.can_transition_to(ProcessingState::Verified));
        assert!(ProcessingState::Received.can_transition_to(ProcessingState::Rejected));
        assert!(!ProcessingState::Received.can_transition_to(ProcessingState::Applied));
    }

    #[test]
    fn applied_and_rejected_are_terminal() {
        for terminal in [ProcessingState::Applied, ProcessingState::Rejected] {
            for target in [
                ProcessingState::Received,
                ProcessingState::Verified,
                ProcessingState::Applied,
                ProcessingState::Rejected,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Entitlement event extraction
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn checkout_completed_extracts_activation() {
        let event = ProviderEventBuilder::new()
            .object(json!({
                "customer": "cus_abc",
                "subscription": "sub_xyz",
                "metadata": { "user_id": "user-7", "tier": "premium" },
                "customer_details": { "email": "user@example.com" }
            }))
            .build();

        let extracted = event.to_entitlement_event().unwrap().unwrap();

        match extracted {
            EntitlementEvent::SubscriptionActivated {
                user_id,
                tier,
                external_customer_id,
                external_subscription_id,
                email,
            } => {
                assert_eq!(user_id.as_str(), "user-7");
                assert_eq!(tier, SubscriptionTier::Premium);
                assert_eq!(external_customer_id.as_deref(), Some("cus_abc"));
                assert_eq!(external_subscription_id, "sub_xyz");
                assert_eq!(email.as_deref(), Some("user@example.com"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn checkout_without_subscription_is_malformed() {
        let event = ProviderEventBuilder::new()
            .object(json!({
                "customer": "cus_abc",
                "metadata": { "user_id": "user-7" }
            }))
            .build();

        let result = event.to_entitlement_event();
        assert!(matches!(result, Err(WebhookError::MissingField(_))));
    }

    #[test]
    fn checkout_without_user_metadata_is_malformed() {
        let event = ProviderEventBuilder::new()
            .object(json!({
                "customer": "cus_abc",
                "subscription": "sub_xyz",
                "metadata": {}
            }))
            .build();

        let result = event.to_entitlement_event();
        assert!(matches!(result, Err(WebhookError::MissingMetadata("user_id"))));
    }

    #[test]
    fn subscription_deleted_extracts_cancellation() {
        let event = ProviderEventBuilder::new()
            .event_type("customer.subscription.deleted")
            .object(json!({
                "id": "sub_xyz",
                "metadata": { "user_id": "user-7" },
                "current_period_end": 1704153600
            }))
            .build();

        let extracted = event.to_entitlement_event().unwrap().unwrap();

        match extracted {
            EntitlementEvent::SubscriptionCanceled { user_id, period_end } => {
                assert_eq!(user_id.as_str(), "user-7");
                assert_eq!(period_end, Some(Timestamp::from_unix_secs(1704153600)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn invoice_payment_failed_extracts_user() {
        let event = ProviderEventBuilder::new()
            .event_type("invoice.payment_failed")
            .object(json!({ "metadata": { "user_id": "user-7" } }))
            .build();

        let extracted = event.to_entitlement_event().unwrap().unwrap();
        assert!(matches!(
            extracted,
            EntitlementEvent::PaymentFailed { user_id } if user_id.as_str() == "user-7"
        ));
    }

    #[test]
    fn unknown_event_type_extracts_nothing() {
        let event = ProviderEventBuilder::new()
            .event_type("customer.created")
            .build();

        assert!(event.to_entitlement_event().unwrap().is_none());
    }
}

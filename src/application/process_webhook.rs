//! ProcessWebhookHandler - command handler for inbound provider webhooks.
//!
//! Wires the verification pipeline: parse the signature header, verify
//! freshness and authenticity, parse the payload, then hand the verified
//! event to the processor. Every rejection is logged with structured
//! fields and counted for security alerting; rejections are scoped to the
//! single event and never affect other events or users.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::webhook::{
    ProcessingState, ProviderEvent, RejectionCounters, SignatureHeader, Verification, WebhookAck,
    WebhookError, WebhookProcessor, WebhookVerifier,
};

/// Command to process a raw webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    /// Raw body bytes, exactly as signed by the provider.
    pub payload: Vec<u8>,
    /// Contents of the signature header.
    pub signature_header: String,
}

/// Handler for processing provider webhook deliveries.
pub struct ProcessWebhookHandler {
    verifier: WebhookVerifier,
    processor: WebhookProcessor,
    counters: Arc<RejectionCounters>,
}

impl ProcessWebhookHandler {
    pub fn new(
        verifier: WebhookVerifier,
        processor: WebhookProcessor,
        counters: Arc<RejectionCounters>,
    ) -> Self {
        Self {
            verifier,
            processor,
            counters,
        }
    }

    /// Rejection counters shared with this handler, for alerting.
    pub fn counters(&self) -> Arc<RejectionCounters> {
        self.counters.clone()
    }

    pub async fn handle(&self, cmd: ProcessWebhookCommand) -> Result<WebhookAck, WebhookError> {
        match self.verify(&cmd) {
            Ok(event) => {
                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    state = ProcessingState::Verified.as_str(),
                    "webhook signature verified"
                );
                self.processor.process(&event).await
            }
            Err(err) => {
                self.counters.record(&err);
                if err.is_security_rejection() {
                    tracing::warn!(
                        error = %err,
                        state = ProcessingState::Rejected.as_str(),
                        "webhook delivery rejected"
                    );
                } else {
                    tracing::warn!(error = %err, "webhook payload rejected");
                }
                Err(err)
            }
        }
    }

    /// Verification pipeline up to a parsed, trusted event.
    fn verify(&self, cmd: &ProcessWebhookCommand) -> Result<ProviderEvent, WebhookError> {
        let header = SignatureHeader::parse(&cmd.signature_header)?;

        match self.verifier.verify(&cmd.payload, &header, Timestamp::now()) {
            Verification::Valid => {}
            Verification::Invalid => return Err(WebhookError::SignatureInvalid),
            Verification::Stale => return Err(WebhookError::ReplaySuspected),
        }

        serde_json::from_slice(&cmd.payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryEntitlementStore;
    use crate::domain::entitlement::{CancellationPolicy, SubscriptionTier};
    use crate::domain::foundation::UserId;
    use crate::domain::webhook::compute_test_signature;
    use crate::ports::{EntitlementStore, UpgradeNotifier};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use serde_json::json;

    const SECRET: &str = "whsec_handler_test";

    struct SilentNotifier;

    #[async_trait]
    impl UpgradeNotifier for SilentNotifier {
        async fn tier_upgraded(
            &self,
            _user_id: &UserId,
            _email: Option<&str>,
            _tier: SubscriptionTier,
        ) {
        }
    }

    fn handler(store: Arc<InMemoryEntitlementStore>) -> ProcessWebhookHandler {
        let verifier = WebhookVerifier::new(vec![SecretString::new(SECRET.to_string())]);
        let processor = WebhookProcessor::new(
            store,
            Arc::new(SilentNotifier),
            CancellationPolicy::PeriodEnd,
            7,
        );
        ProcessWebhookHandler::new(verifier, processor, Arc::new(RejectionCounters::new()))
    }

    fn checkout_payload(event_id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "created": chrono::Utc::now().timestamp(),
            "data": {
                "object": {
                    "customer": "cus_1",
                    "subscription": "sub_1",
                    "metadata": { "user_id": "user-1", "tier": "premium" }
                }
            },
            "livemode": false
        }))
        .unwrap()
    }

    fn signed_command(payload: Vec<u8>) -> ProcessWebhookCommand {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature(SECRET, timestamp, &payload);
        ProcessWebhookCommand {
            payload,
            signature_header: format!("t={},v1={}", timestamp, signature),
        }
    }

    #[tokio::test]
    async fn valid_delivery_is_applied() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let handler = handler(store.clone());

        let ack = handler
            .handle(signed_command(checkout_payload("evt_1")))
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::Applied);
        let record = store
            .get(&UserId::new("user-1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.tier, SubscriptionTier::Premium);
    }

    #[tokio::test]
    async fn redelivery_is_acknowledged() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let handler = handler(store);

        handler
            .handle(signed_command(checkout_payload("evt_1")))
            .await
            .unwrap();
        let ack = handler
            .handle(signed_command(checkout_payload("evt_1")))
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::AlreadyApplied);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_and_counted() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let handler = handler(store.clone());
        let counters = handler.counters();

        let payload = checkout_payload("evt_1");
        let timestamp = chrono::Utc::now().timestamp();
        let cmd = ProcessWebhookCommand {
            payload,
            signature_header: format!("t={},v1={}", timestamp, "a".repeat(64)),
        };

        let result = handler.handle(cmd).await;

        assert!(matches!(result, Err(WebhookError::SignatureInvalid)));
        assert_eq!(counters.signature_invalid(), 1);
        assert!(store
            .get(&UserId::new("user-1").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn stale_delivery_is_rejected_even_when_correctly_signed() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let handler = handler(store);
        let counters = handler.counters();

        let payload = checkout_payload("evt_1");
        let old_timestamp = chrono::Utc::now().timestamp() - 600;
        let signature = compute_test_signature(SECRET, old_timestamp, &payload);
        let cmd = ProcessWebhookCommand {
            payload,
            signature_header: format!("t={},v1={}", old_timestamp, signature),
        };

        let result = handler.handle(cmd).await;

        assert!(matches!(result, Err(WebhookError::ReplaySuspected)));
        assert_eq!(counters.replay_suspected(), 1);
    }

    #[tokio::test]
    async fn unparseable_body_is_malformed() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let handler = handler(store);

        let result = handler
            .handle(signed_command(b"not json".to_vec()))
            .await;

        assert!(matches!(result, Err(WebhookError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn missing_header_fields_are_malformed() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let handler = handler(store);

        let cmd = ProcessWebhookCommand {
            payload: checkout_payload("evt_1"),
            signature_header: "t=123".to_string(),
        };

        let result = handler.handle(cmd).await;

        assert!(matches!(result, Err(WebhookError::MalformedHeader(_))));
    }
}

//! Webhook error taxonomy.
//!
//! Each variant carries its retryability and HTTP status mapping: the
//! status controls whether the provider redelivers, so getting it wrong
//! either drops events or retries hopeless ones forever.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::StatusCode;
use thiserror::Error;

use crate::ports::StoreError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature did not match any configured secret.
    #[error("Invalid signature")]
    SignatureInvalid,

    /// Timestamp outside the tolerance window; a correctly signed but
    /// old payload still lands here.
    #[error("Replay suspected: timestamp outside tolerance")]
    ReplaySuspected,

    /// Signature header could not be parsed.
    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    /// Payload JSON missing or of the wrong shape for its event type.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Required metadata field missing from the event payload.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Required field missing from the event payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Event type we do not handle; acknowledged so the provider stops
    /// retrying, logged at informational level for forward compatibility.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// No entitlement record for a non-activating event. The activating
    /// checkout event may still be in flight, so redelivery can succeed.
    #[error("No entitlement record for user {0}")]
    EntitlementMissing(String),

    /// Store unavailable; the event stays unacknowledged and the
    /// provider's redelivery recovers it.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::StoreUnavailable(_) | WebhookError::EntitlementMissing(_)
        )
    }

    /// Returns true for security-relevant rejections worth alerting on.
    pub fn is_security_rejection(&self) -> bool {
        matches!(
            self,
            WebhookError::SignatureInvalid
                | WebhookError::ReplaySuspected
                | WebhookError::MalformedHeader(_)
        )
    }

    /// Maps the error to the HTTP status returned to the provider.
    ///
    /// - 2xx: acknowledged, no retry
    /// - 4xx: rejected, no retry
    /// - 5xx: transient, provider will redeliver
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureInvalid | WebhookError::ReplaySuspected => {
                StatusCode::UNAUTHORIZED
            }

            WebhookError::MalformedHeader(_)
            | WebhookError::MalformedPayload(_)
            | WebhookError::MissingMetadata(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            // Acknowledged so the provider stops retrying.
            WebhookError::UnknownEventType(_) => StatusCode::OK,

            WebhookError::EntitlementMissing(_) | WebhookError::StoreUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for WebhookError {
    fn from(err: StoreError) -> Self {
        WebhookError::StoreUnavailable(err.to_string())
    }
}

/// Monotonic counters over rejected deliveries, for security alerting.
///
/// Shared via `Arc` between the webhook path and whatever scrapes them.
#[derive(Debug, Default)]
pub struct RejectionCounters {
    signature_invalid: AtomicU64,
    replay_suspected: AtomicU64,
    malformed: AtomicU64,
}

impl RejectionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a rejection under the matching counter. Retryable errors
    /// and acknowledged unknowns are not rejections and are not counted.
    pub fn record(&self, err: &WebhookError) {
        match err {
            WebhookError::SignatureInvalid => {
                self.signature_invalid.fetch_add(1, Ordering::Relaxed);
            }
            WebhookError::ReplaySuspected => {
                self.replay_suspected.fetch_add(1, Ordering::Relaxed);
            }
            WebhookError::MalformedHeader(_)
            | WebhookError::MalformedPayload(_)
            | WebhookError::MissingMetadata(_)
            | WebhookError::MissingField(_) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
            }
            WebhookError::UnknownEventType(_)
            | WebhookError::EntitlementMissing(_)
            | WebhookError::StoreUnavailable(_) => {}
        }
    }

    pub fn signature_invalid(&self) -> u64 {
        self.signature_invalid.load(Ordering::Relaxed)
    }

    pub fn replay_suspected(&self) -> u64 {
        self.replay_suspected.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

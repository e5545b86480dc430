//! Webhook reconciliation domain: signature verification, event parsing,
//! and idempotent application of provider events.

mod errors;
mod event;
mod processor;
mod signature;

pub use errors::{RejectionCounters, WebhookError};
pub use event::{
    EntitlementEvent, ProcessingState, ProviderEvent, ProviderEventData, ProviderEventType,
};
pub use processor::{WebhookAck, WebhookProcessor};
pub use signature::{
    SignatureHeader, Verification, WebhookVerifier, MAX_CLOCK_SKEW_SECS, MAX_EVENT_AGE_SECS,
};

#[cfg(test)]
pub use event::ProviderEventBuilder;
#[cfg(test)]
pub use signature::compute_test_signature;

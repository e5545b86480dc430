//! Payment provider port for external checkout processing.
//!
//! The provider is a collaborator, not part of this core: only the calls
//! the entitlement flow initiates appear here, and every mutating call
//! takes a caller-supplied idempotency key so that client-side retries
//! never create duplicate customers or subscriptions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entitlement::SubscriptionTier;
use crate::domain::foundation::{UserId, ValidationError};

/// Caller-supplied idempotency key for provider mutations.
///
/// The same key on a retried call must yield the same provider-side
/// object. Generated once per logical operation by the caller, never by
/// the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a key, returning error if empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::empty_field("idempotency_key"));
        }
        Ok(Self(key))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request to create a provider customer.
#[derive(Debug, Clone)]
pub struct CreateCustomerRequest {
    /// Internal user ID (stored as provider metadata).
    pub user_id: UserId,
    /// Customer email address.
    pub email: String,
    /// Key making retries of this call safe.
    pub idempotency_key: IdempotencyKey,
}

/// A customer in the payment system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    /// Provider customer ID (cus_xxx).
    pub id: String,
    /// Email on record with the provider.
    pub email: Option<String>,
}

/// Request to create a checkout session for a paid tier.
#[derive(Debug, Clone)]
pub struct CreateCheckoutRequest {
    pub user_id: UserId,
    pub email: String,
    /// Tier being purchased. Must be a paid tier.
    pub tier: SubscriptionTier,
    /// Where the provider redirects after successful payment.
    pub success_url: String,
    /// Where the provider redirects on abandonment.
    pub cancel_url: String,
    /// Key making retries of this call safe.
    pub idempotency_key: IdempotencyKey,
}

/// A checkout session awaiting user completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Provider session ID (cs_xxx).
    pub id: String,
    /// Hosted payment page URL for the user.
    pub url: String,
    /// Unix timestamp when the session expires.
    pub expires_at: i64,
}

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The provider rejected the request.
    #[error("provider error: {0}")]
    Provider(String),

    /// Transport-level failure reaching the provider.
    #[error("network error: {0}")]
    Network(String),

    /// The provider's response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The requested tier has no purchasable price.
    #[error("tier {0} is not purchasable")]
    NotPurchasable(SubscriptionTier),
}

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a customer in the payment system.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError>;

    /// Creates a checkout session for initial subscription purchase.
    ///
    /// Returns a URL for the customer to complete payment. The resulting
    /// webhook events, not this call's response, drive entitlement state.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn PaymentProvider) {}
    }

    #[test]
    fn idempotency_key_rejects_empty() {
        assert!(IdempotencyKey::new("").is_err());
    }

    #[test]
    fn idempotency_key_roundtrips() {
        let key = IdempotencyKey::new("checkout-user-1-001").unwrap();
        assert_eq!(key.as_str(), "checkout-user-1-001");
        assert_eq!(key.to_string(), "checkout-user-1-001");
    }
}

//! Mock payment provider for tests and local development.
//!
//! Honors the idempotency contract for real: a retried call with the
//! same key returns the object created the first time, which is exactly
//! the behavior callers rely on Stripe for.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentProvider,
};

#[derive(Default)]
struct MockState {
    customers: HashMap<String, Customer>,
    sessions: HashMap<String, CheckoutSession>,
    next_id: u64,
}

/// In-memory payment provider.
#[derive(Default)]
pub struct MockPaymentProvider {
    state: Mutex<MockState>,
    fail_all: bool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every call fails, for error-path tests.
    pub fn failing() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fail_all: true,
        }
    }

    /// Number of distinct checkout sessions created so far.
    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        if self.fail_all {
            return Err(PaymentError::Provider("mock failure".to_string()));
        }

        let mut state = self.state.lock().unwrap();
        let key = request.idempotency_key.as_str().to_string();

        if let Some(existing) = state.customers.get(&key) {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let customer = Customer {
            id: format!("cus_mock_{}", state.next_id),
            email: Some(request.email),
        };
        state.customers.insert(key, customer.clone());
        Ok(customer)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        if self.fail_all {
            return Err(PaymentError::Provider("mock failure".to_string()));
        }
        if !request.tier.is_paid() {
            return Err(PaymentError::NotPurchasable(request.tier));
        }

        let mut state = self.state.lock().unwrap();
        let key = request.idempotency_key.as_str().to_string();

        if let Some(existing) = state.sessions.get(&key) {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let session = CheckoutSession {
            id: format!("cs_mock_{}", state.next_id),
            url: format!("https://checkout.example.test/cs_mock_{}", state.next_id),
            expires_at: 4_102_444_800, // far future
        };
        state.sessions.insert(key, session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::SubscriptionTier;
    use crate::domain::foundation::UserId;
    use crate::ports::IdempotencyKey;

    fn checkout_request(key: &str) -> CreateCheckoutRequest {
        CreateCheckoutRequest {
            user_id: UserId::new("user-1").unwrap(),
            email: "user@example.com".to_string(),
            tier: SubscriptionTier::Premium,
            success_url: "https://app.example.test/done".to_string(),
            cancel_url: "https://app.example.test/cancel".to_string(),
            idempotency_key: IdempotencyKey::new(key).unwrap(),
        }
    }

    #[tokio::test]
    async fn same_key_returns_same_session() {
        let provider = MockPaymentProvider::new();

        let first = provider
            .create_checkout_session(checkout_request("key-1"))
            .await
            .unwrap();
        let retried = provider
            .create_checkout_session(checkout_request("key-1"))
            .await
            .unwrap();

        assert_eq!(first, retried);
        assert_eq!(provider.session_count(), 1);
    }

    #[tokio::test]
    async fn different_keys_create_distinct_sessions() {
        let provider = MockPaymentProvider::new();

        let first = provider
            .create_checkout_session(checkout_request("key-1"))
            .await
            .unwrap();
        let second = provider
            .create_checkout_session(checkout_request("key-2"))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(provider.session_count(), 2);
    }

    #[tokio::test]
    async fn freemium_checkout_is_refused() {
        let provider = MockPaymentProvider::new();
        let mut request = checkout_request("key-1");
        request.tier = SubscriptionTier::Freemium;

        let result = provider.create_checkout_session(request).await;

        assert!(matches!(result, Err(PaymentError::NotPurchasable(_))));
    }

    #[tokio::test]
    async fn customer_creation_is_idempotent_too() {
        let provider = MockPaymentProvider::new();
        let request = CreateCustomerRequest {
            user_id: UserId::new("user-1").unwrap(),
            email: "user@example.com".to_string(),
            idempotency_key: IdempotencyKey::new("cust-1").unwrap(),
        };

        let first = provider.create_customer(request.clone()).await.unwrap();
        let retried = provider.create_customer(request).await.unwrap();

        assert_eq!(first, retried);
    }
}

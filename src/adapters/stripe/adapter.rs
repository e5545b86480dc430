//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API.
//! Every mutating call forwards the caller's idempotency key in the
//! `Idempotency-Key` header, so a retried request replays the original
//! result instead of creating a second customer or subscription.
//!
//! Webhook verification does NOT live here: inbound deliveries are
//! verified by the pure domain verifier before anything else runs.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::entitlement::SubscriptionTier;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentProvider,
};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Price ID for the Premium plan.
    premium_price_id: Option<String>,

    /// Base URL for the Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>, premium_price_id: Option<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            premium_price_id,
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripeGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeGateway {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn price_id(&self, tier: SubscriptionTier) -> Result<&str, PaymentError> {
        if !tier.is_paid() {
            return Err(PaymentError::NotPurchasable(tier));
        }
        self.config
            .premium_price_id
            .as_deref()
            .ok_or_else(|| PaymentError::Provider("no price configured for tier".to_string()))
    }
}

/// Stripe customer response (fields we read).
#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    email: Option<String>,
}

/// Stripe checkout session response (fields we read).
#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: Option<String>,
    expires_at: Option<i64>,
}

#[async_trait]
impl PaymentProvider for StripeGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let url = format!("{}/v1/customers", self.config.api_base_url);

        let params = vec![
            ("email", request.email),
            ("metadata[user_id]", request.user_id.to_string()),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .header("Idempotency-Key", request.idempotency_key.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let customer: StripeCustomer = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        Ok(Customer {
            id: customer.id,
            email: customer.email,
        })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let price_id = self.price_id(request.tier)?.to_string();
        let user_id = request.user_id.to_string();
        let tier = request.tier.as_str().to_string();

        // user_id/tier metadata lands on both the session and the
        // subscription it creates, so every later webhook (deletion,
        // failed invoice) can be attributed without extra lookups.
        let params = vec![
            ("mode", "subscription".to_string()),
            ("customer_email", request.email),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("client_reference_id", user_id.clone()),
            ("metadata[user_id]", user_id.clone()),
            ("metadata[tier]", tier.clone()),
            ("subscription_data[metadata][user_id]", user_id),
            ("subscription_data[metadata][tier]", tier),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .header("Idempotency-Key", request.idempotency_key.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let session: StripeCheckoutSession = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        // Checkout sessions expire after 24 hours unless Stripe says otherwise.
        let expires_at = session
            .expires_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp() + 24 * 60 * 60);

        let url = session
            .url
            .ok_or_else(|| PaymentError::InvalidResponse("session has no url".to_string()))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
            expires_at,
        })
    }
}

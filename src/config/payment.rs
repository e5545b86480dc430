//! Payment configuration

use secrecy::SecretString;
use serde::Deserialize;

use crate::domain::entitlement::CancellationPolicy;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret (current)
    pub stripe_webhook_secret: String,

    /// Previous webhook signing secret, kept valid during rotation
    pub stripe_webhook_secret_previous: Option<String>,

    /// Stripe price ID for the Premium plan
    pub stripe_premium_price_id: Option<String>,

    /// When a cancellation downgrades the user
    #[serde(default)]
    pub cancellation_policy: CancellationPolicy,

    /// Days of access retained after a failed renewal charge
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: i64,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// All currently-valid webhook signing secrets, newest first.
    pub fn webhook_secrets(&self) -> Vec<SecretString> {
        let mut secrets = vec![SecretString::new(self.stripe_webhook_secret.clone())];
        if let Some(previous) = &self.stripe_webhook_secret_previous {
            secrets.push(SecretString::new(previous.clone()));
        }
        secrets
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if let Some(previous) = &self.stripe_webhook_secret_previous {
            if !previous.starts_with("whsec_") {
                return Err(ValidationError::InvalidStripeWebhookSecret);
            }
        }

        if self.grace_period_days <= 0 || self.grace_period_days > 90 {
            return Err(ValidationError::InvalidGracePeriod);
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_webhook_secret_previous: None,
            stripe_premium_price_id: None,
            cancellation_policy: CancellationPolicy::default(),
            grace_period_days: default_grace_period_days(),
        }
    }
}

fn default_grace_period_days() -> i64 {
    7
}

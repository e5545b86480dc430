//! Resend email notifier.
//!
//! Sends the upgrade confirmation email. Strictly fire-and-forget: every
//! failure path ends in a log line, never in an error the caller could
//! see, so a broken email provider cannot block or revert an
//! entitlement mutation.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::config::EmailConfig;
use crate::domain::entitlement::SubscriptionTier;
use crate::domain::foundation::UserId;
use crate::ports::UpgradeNotifier;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Notifier backed by the Resend HTTP API.
pub struct ResendNotifier {
    api_key: SecretString,
    from_header: String,
    http_client: reqwest::Client,
    api_url: String,
}

impl ResendNotifier {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            api_key: SecretString::new(config.resend_api_key.clone()),
            from_header: config.from_header(),
            http_client: reqwest::Client::new(),
            api_url: RESEND_API_URL.to_string(),
        }
    }

    /// Override the API URL (for testing).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[async_trait]
impl UpgradeNotifier for ResendNotifier {
    async fn tier_upgraded(&self, user_id: &UserId, email: Option<&str>, tier: SubscriptionTier) {
        let Some(to) = email else {
            tracing::debug!(
                user_id = %user_id,
                "no email captured at checkout, skipping upgrade notification"
            );
            return;
        };

        let body = json!({
            "from": self.from_header,
            "to": [to],
            "subject": format!("Welcome to Plancraft {}", tier.display_name()),
            "html": format!(
                "<p>Your {} subscription is active. Enjoy your expanded daily plan quota!</p>",
                tier.display_name()
            ),
        });

        let result = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(user_id = %user_id, tier = %tier, "upgrade notification sent");
            }
            Ok(response) => {
                tracing::warn!(
                    user_id = %user_id,
                    status = %response.status(),
                    "upgrade notification rejected by email provider"
                );
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %err,
                    "upgrade notification failed to send"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> ResendNotifier {
        let config = EmailConfig {
            resend_api_key: "re_test_key".to_string(),
            ..Default::default()
        };
        // Unroutable address: every send fails fast.
        ResendNotifier::new(&config).with_api_url("http://127.0.0.1:1")
    }

    #[tokio::test]
    async fn send_failure_does_not_propagate() {
        let user = UserId::new("user-1").unwrap();
        // Returns unit regardless of transport failure.
        notifier()
            .tier_upgraded(&user, Some("user@example.com"), SubscriptionTier::Premium)
            .await;
    }

    #[tokio::test]
    async fn missing_email_is_skipped() {
        let user = UserId::new("user-1").unwrap();
        notifier()
            .tier_upgraded(&user, None, SubscriptionTier::Premium)
            .await;
    }
}

//! Request/response DTOs for the entitlement endpoints.

use serde::{Deserialize, Serialize};

use crate::application::{EntitlementSnapshot, QuotaDecision};
use crate::domain::entitlement::SubscriptionTier;

/// GET /api/entitlement response.
#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    pub user_id: String,
    pub tier: SubscriptionTier,
    pub daily_plan_limit: u32,
    pub resources_per_plan: u32,
    pub email_notifications_enabled: bool,
    pub grace_until: Option<String>,
}

impl From<EntitlementSnapshot> for EntitlementResponse {
    fn from(snapshot: EntitlementSnapshot) -> Self {
        Self {
            user_id: snapshot.user_id.to_string(),
            tier: snapshot.tier,
            daily_plan_limit: snapshot.config.daily_plan_limit,
            resources_per_plan: snapshot.config.resources_per_plan,
            email_notifications_enabled: snapshot.config.email_notifications_enabled,
            grace_until: snapshot.grace_until.map(|t| t.to_string()),
        }
    }
}

/// POST /api/entitlement/quota response.
#[derive(Debug, Serialize)]
pub struct QuotaClaimResponse {
    pub allowed: bool,
    /// Slots left today; present only when allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    /// Non-technical explanation for the user.
    pub message: &'static str,
}

impl From<QuotaDecision> for QuotaClaimResponse {
    fn from(decision: QuotaDecision) -> Self {
        let message = decision.user_message();
        match decision {
            QuotaDecision::Allowed { remaining } => Self {
                allowed: true,
                remaining: Some(remaining),
                message,
            },
            QuotaDecision::Denied { .. } => Self {
                allowed: false,
                remaining: None,
                message,
            },
        }
    }
}

/// POST /api/checkout request.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub email: String,
    pub tier: SubscriptionTier,
    pub success_url: String,
    pub cancel_url: String,
    /// Client-generated key; resubmitting the same request with the
    /// same key must not create a second subscription.
    pub idempotency_key: String,
}

/// POST /api/checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
    pub expires_at: i64,
}

/// Standard error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

//! HTTP handlers for the user-facing entitlement endpoints.
//!
//! Every handler starts from an `AuthenticatedUser` and a store-backed
//! snapshot; nothing here trusts a tier or limit supplied by the client.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::{DenialReason, QuotaDecision, QuotaGate, SessionReconciler};
use crate::domain::foundation::{UsageDay, UserId};
use crate::ports::{
    CreateCheckoutRequest, IdempotencyKey, PaymentError, PaymentProvider, StoreError,
};

use super::dto::{
    CheckoutRequest, CheckoutResponse, EntitlementResponse, ErrorResponse, QuotaClaimResponse,
};

/// Shared application state for the entitlement routes.
#[derive(Clone)]
pub struct EntitlementAppState {
    pub reconciler: Arc<SessionReconciler>,
    pub quota_gate: Arc<QuotaGate>,
    pub payment_provider: Arc<dyn PaymentProvider>,
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context (real auth terminates upstream; see routes docs)
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from the request.
///
/// The gateway in front of this service validates the session token and
/// forwards the subject as `X-User-Id`; this extractor only refuses
/// requests where that contract was not honored.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = parts
                .headers
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| UserId::new(s).ok())
                .ok_or(AuthenticationRequired)?;

            Ok(AuthenticatedUser { user_id })
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/entitlement - current entitlement snapshot.
pub async fn get_entitlement(
    State(state): State<EntitlementAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let snapshot = state.reconciler.snapshot(&user.user_id).await?;
    Ok(Json(EntitlementResponse::from(snapshot)))
}

/// POST /api/entitlement/quota - claim one plan slot for today.
///
/// The tier feeding the gate comes from the snapshot, never from the
/// request body.
pub async fn claim_quota(
    State(state): State<EntitlementAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let snapshot = state.reconciler.snapshot(&user.user_id).await?;

    let decision = state
        .quota_gate
        .check_and_increment(&user.user_id, snapshot.tier, UsageDay::today())
        .await;

    let status = match decision {
        QuotaDecision::Allowed { .. } => StatusCode::OK,
        QuotaDecision::Denied {
            reason: DenialReason::DailyLimitReached,
        } => StatusCode::TOO_MANY_REQUESTS,
        QuotaDecision::Denied {
            reason: DenialReason::StoreUnavailable,
        } => StatusCode::SERVICE_UNAVAILABLE,
    };

    Ok((status, Json(QuotaClaimResponse::from(decision))))
}

/// POST /api/checkout - start a provider checkout for a paid tier.
pub async fn create_checkout(
    State(state): State<EntitlementAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let idempotency_key = IdempotencyKey::new(request.idempotency_key)
        .map_err(|_| EntitlementApiError::InvalidRequest("idempotency_key is required"))?;

    let session = state
        .payment_provider
        .create_checkout_session(CreateCheckoutRequest {
            user_id: user.user_id,
            email: request.email,
            tier: request.tier,
            success_url: request.success_url,
            cancel_url: request.cancel_url,
            idempotency_key,
        })
        .await?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
        expires_at: session.expires_at,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type converting application errors to HTTP responses.
pub enum EntitlementApiError {
    Store(StoreError),
    Payment(PaymentError),
    InvalidRequest(&'static str),
}

impl From<StoreError> for EntitlementApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<PaymentError> for EntitlementApiError {
    fn from(err: PaymentError) -> Self {
        Self::Payment(err)
    }
}

impl IntoResponse for EntitlementApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            EntitlementApiError::Store(err) => {
                tracing::error!(error = %err, "entitlement read failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Please try again shortly.".to_string(),
                )
            }
            EntitlementApiError::Payment(PaymentError::NotPurchasable(tier)) => (
                StatusCode::BAD_REQUEST,
                "TIER_NOT_PURCHASABLE",
                format!("The {} tier cannot be purchased.", tier),
            ),
            EntitlementApiError::Payment(err) => {
                tracing::error!(error = %err, "checkout creation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "PAYMENT_PROVIDER_ERROR",
                    "We couldn't start checkout. Please try again.".to_string(),
                )
            }
            EntitlementApiError::InvalidRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
                reason.to_string(),
            ),
        };

        let body = ErrorResponse::new(code, message);
        (status, Json(body)).into_response()
    }
}

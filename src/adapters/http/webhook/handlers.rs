//! HTTP handler for provider webhook deliveries.
//!
//! The response status is the retry protocol: 2xx is returned only once
//! the event's outcome is durably recorded, anything else tells the
//! provider to redeliver the same event id later.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::application::{ProcessWebhookCommand, ProcessWebhookHandler};
use crate::domain::webhook::WebhookError;

use super::dto::{WebhookAckResponse, WebhookErrorResponse};

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub handler: Arc<ProcessWebhookHandler>,
}

/// POST /api/webhooks/stripe - process a provider delivery.
pub async fn handle_stripe_webhook(
    State(state): State<WebhookAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            WebhookApiError(WebhookError::MalformedHeader(
                "missing Stripe-Signature header".to_string(),
            ))
        })?;

    let cmd = ProcessWebhookCommand {
        payload: body.to_vec(),
        signature_header: signature.to_string(),
    };

    let ack = state.handler.handle(cmd).await?;

    Ok((StatusCode::OK, Json(WebhookAckResponse::from(ack))))
}

/// API error wrapper mapping webhook errors to provider-facing statuses.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let body = WebhookErrorResponse {
            error: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

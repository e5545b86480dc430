//! Axum router for the provider webhook endpoint.
//!
//! Separate from the user-facing API because webhooks carry no user
//! authentication; trust comes from the signature alone.

use axum::{routing::post, Router};

use super::handlers::{handle_stripe_webhook, WebhookAppState};

/// Create the webhook router.
///
/// # Routes
/// - `POST /stripe` - Handle Stripe webhook deliveries
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

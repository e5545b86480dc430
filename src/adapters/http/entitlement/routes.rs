//! Axum router for the user-facing entitlement endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{claim_quota, create_checkout, get_entitlement, EntitlementAppState};

/// Create the entitlement API router.
///
/// # Routes (all require authentication)
/// - `GET /` - Current entitlement snapshot
/// - `POST /quota` - Claim one plan slot for today
/// - `POST /checkout` - Start a provider checkout for a paid tier
pub fn entitlement_routes() -> Router<EntitlementAppState> {
    Router::new()
        .route("/", get(get_entitlement))
        .route("/quota", post(claim_quota))
        .route("/checkout", post(create_checkout))
}

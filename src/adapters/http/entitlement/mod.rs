//! Entitlement HTTP surface: routes, handlers, and DTOs.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AuthenticatedUser, EntitlementAppState};
pub use routes::entitlement_routes;

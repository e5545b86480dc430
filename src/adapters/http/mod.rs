//! HTTP adapters (axum) exposing the service's inbound surfaces.

pub mod entitlement;
pub mod webhook;

//! Plancraft entitlement service
//!
//! Reconciles subscription state from payment-provider webhooks and
//! enforces per-user daily plan quotas. Webhook deliveries are verified,
//! applied idempotently (last-writer-by-timestamp-wins), and quota
//! claims are atomic check-and-increments that fail closed.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `EntitlementStore` - persisted entitlement records, applied-event
//!   idempotency, and atomic usage counters
//! - `PaymentProvider` - checkout/customer creation with caller-supplied
//!   idempotency keys
//! - `UpgradeNotifier` - fire-and-forget upgrade notification

mod entitlement_store;
mod notifier;
mod payment_provider;

pub use entitlement_store::{
    ApplyOutcome, EntitlementStore, RejectReason, StoreError, UsageDecision,
};
pub use notifier::UpgradeNotifier;
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, IdempotencyKey,
    PaymentError, PaymentProvider,
};

//! Entitlement domain: tiers, per-tier configuration, and the record
//! reconciled from payment-provider events.

mod record;
mod tier;
mod tier_config;

pub use record::{
    AppliedChange, CancellationPolicy, EntitlementMutation, EntitlementRecord,
};
pub use tier::SubscriptionTier;
pub use tier_config::TierConfig;

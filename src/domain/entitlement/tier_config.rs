//! Per-tier entitlement configuration.
//!
//! Each tier binds to one immutable configuration; user-facing code reads
//! limits from here and never from client-supplied values.

use super::SubscriptionTier;
use serde::{Deserialize, Serialize};

/// Immutable configuration for a subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// The tier this configuration applies to.
    pub tier: SubscriptionTier,
    /// Plans a user may generate per UTC day.
    pub daily_plan_limit: u32,
    /// Resources included in each generated plan.
    pub resources_per_plan: u32,
    /// Whether the user receives email notifications (e.g. on upgrade).
    pub email_notifications_enabled: bool,
    /// Monthly price in cents. Zero for the free tier.
    pub price_cents: u32,
}

impl TierConfig {
    /// Get the configuration for a specific tier.
    ///
    /// | Tier | Plans/day | Resources/plan | Email | Price |
    /// |------|-----------|----------------|-------|-------|
    /// | Freemium | 1 | 3 | No | $0 |
    /// | Premium | 10 | 10 | Yes | $9.99/mo |
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Freemium => Self {
                tier,
                daily_plan_limit: 1,
                resources_per_plan: 3,
                email_notifications_enabled: false,
                price_cents: 0,
            },
            SubscriptionTier::Premium => Self {
                tier,
                daily_plan_limit: 10,
                resources_per_plan: 10,
                email_notifications_enabled: true,
                price_cents: 999,
            },
        }
    }
}

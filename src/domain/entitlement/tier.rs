//! Subscription tier definitions.
//!
//! Represents the entitlement levels available in Plancraft.

use serde::{Deserialize, Serialize};

/// Subscription tier.
///
/// Determines daily plan quota, plan richness, and notification behavior.
/// The set is closed: an unrecognized tier value cannot exist at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Free tier - one plan per day, no email notifications.
    Freemium,

    /// Paid tier - full daily quota and email notifications.
    Premium,
}

impl SubscriptionTier {
    /// Returns true if this tier is a paid tier.
    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionTier::Freemium)
    }

    /// Returns the display name for this tier.
    pub fn display_name(&self) -> &'static str {
        match self {
            SubscriptionTier::Freemium => "Freemium",
            SubscriptionTier::Premium => "Premium",
        }
    }

    /// Returns the wire/storage form of this tier (matches serde).
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Freemium => "freemium",
            SubscriptionTier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freemium_is_not_paid() {
        assert!(!SubscriptionTier::Freemium.is_paid());
    }

    #[test]
    fn premium_is_paid() {
        assert!(SubscriptionTier::Premium.is_paid());
    }

    #[test]
    fn tier_serializes_lowercase() {
        let json = serde_json::to_string(&SubscriptionTier::Premium).unwrap();
        assert_eq!(json, "\"premium\"");
    }

    #[test]
    fn tier_deserializes_from_lowercase() {
        let tier: SubscriptionTier = serde_json::from_str("\"freemium\"").unwrap();
        assert_eq!(tier, SubscriptionTier::Freemium);
    }
}

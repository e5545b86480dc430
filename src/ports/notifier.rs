//! UpgradeNotifier port - fire-and-forget tier upgrade notification.
//!
//! Invoked only when an applied event upgrades a user into the
//! notification-enabled tier. The signature returns nothing: a failed
//! notification is the implementation's problem to log, and can never
//! block or revert the entitlement mutation that triggered it.

use async_trait::async_trait;

use crate::domain::entitlement::SubscriptionTier;
use crate::domain::foundation::UserId;

/// Port for notifying a user about a tier upgrade.
#[async_trait]
pub trait UpgradeNotifier: Send + Sync {
    /// Notifies the user of an upgrade to `tier`.
    ///
    /// `email` is the address captured at checkout, when the provider
    /// supplied one. Implementations log and swallow their own failures.
    async fn tier_upgraded(&self, user_id: &UserId, email: Option<&str>, tier: SubscriptionTier);
}

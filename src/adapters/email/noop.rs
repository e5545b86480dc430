//! No-op notifier for environments without an email provider.

use async_trait::async_trait;

use crate::domain::entitlement::SubscriptionTier;
use crate::domain::foundation::UserId;
use crate::ports::UpgradeNotifier;

/// Notifier that only logs.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl UpgradeNotifier for NoopNotifier {
    async fn tier_upgraded(&self, user_id: &UserId, _email: Option<&str>, tier: SubscriptionTier) {
        tracing::info!(user_id = %user_id, tier = %tier, "upgrade notification suppressed (noop notifier)");
    }
}

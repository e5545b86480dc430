//! PostgreSQL implementation of the EntitlementStore port.
//!
//! Atomicity strategy:
//! - `apply_event` runs one transaction: an `ON CONFLICT DO NOTHING`
//!   insert into `applied_events` decides the idempotency race (first
//!   writer wins on the primary key), then the record row is mutated
//!   under `FOR UPDATE` and both commit together.
//! - `increment_usage` is a single conditional upsert; the
//!   `WHERE count < limit` clause makes the check-and-increment one
//!   atomic statement, so concurrent claims for the last slot cannot
//!   both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entitlement::{EntitlementMutation, EntitlementRecord, SubscriptionTier};
use crate::domain::foundation::{EventId, Timestamp, UsageDay, UserId};
use crate::ports::{
    ApplyOutcome, EntitlementStore, RejectReason, StoreError, UsageDecision,
};

/// PostgreSQL entitlement store.
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    /// Creates a new store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an entitlement record.
#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    user_id: String,
    tier: String,
    tier_effective_at: DateTime<Utc>,
    external_customer_id: Option<String>,
    external_subscription_id: Option<String>,
    last_applied_event_id: Option<String>,
    last_applied_event_at: Option<DateTime<Utc>>,
    grace_until: Option<DateTime<Utc>>,
}

impl TryFrom<EntitlementRow> for EntitlementRecord {
    type Error = StoreError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let user_id = UserId::new(row.user_id)
            .map_err(|e| StoreError::Unavailable(format!("invalid user_id in row: {}", e)))?;
        let last_applied_event_id = row
            .last_applied_event_id
            .map(EventId::new)
            .transpose()
            .map_err(|e| StoreError::Unavailable(format!("invalid event_id in row: {}", e)))?;

        Ok(EntitlementRecord {
            user_id,
            tier: parse_tier(&row.tier)?,
            tier_effective_at: Timestamp::from_datetime(row.tier_effective_at),
            external_customer_id: row.external_customer_id,
            external_subscription_id: row.external_subscription_id,
            last_applied_event_id,
            last_applied_event_at: row.last_applied_event_at.map(Timestamp::from_datetime),
            grace_until: row.grace_until.map(Timestamp::from_datetime),
        })
    }
}

fn parse_tier(s: &str) -> Result<SubscriptionTier, StoreError> {
    match s {
        "freemium" => Ok(SubscriptionTier::Freemium),
        "premium" => Ok(SubscriptionTier::Premium),
        other => Err(StoreError::Unavailable(format!(
            "invalid tier value in row: {}",
            other
        ))),
    }
}

fn db_err(context: &str, err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {}", context, err))
}

const SELECT_RECORD: &str = r#"
    SELECT user_id, tier, tier_effective_at, external_customer_id,
           external_subscription_id, last_applied_event_id,
           last_applied_event_at, grace_until
    FROM entitlements
    WHERE user_id = $1
"#;

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<EntitlementRecord>, StoreError> {
        let row: Option<EntitlementRow> = sqlx::query_as(SELECT_RECORD)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("failed to read entitlement", e))?;

        row.map(EntitlementRecord::try_from).transpose()
    }

    async fn apply_event(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        event_at: Timestamp,
        mutation: &EntitlementMutation,
    ) -> Result<ApplyOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("failed to begin transaction", e))?;

        // First writer on the event id wins; everyone else sees a
        // duplicate and acknowledges without re-executing effects.
        let inserted = sqlx::query(
            r#"
            INSERT INTO applied_events (event_id, user_id, event_at, applied_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id.as_str())
        .bind(user_id.as_str())
        .bind(event_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("failed to mark event applied", e))?;

        if inserted.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| db_err("failed to rollback", e))?;
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let row: Option<EntitlementRow> =
            sqlx::query_as(&format!("{} FOR UPDATE", SELECT_RECORD))
                .bind(user_id.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_err("failed to lock entitlement", e))?;

        let mut record = match row {
            Some(row) => EntitlementRecord::try_from(row)?,
            None => {
                if !matches!(mutation, EntitlementMutation::Activate { .. }) {
                    // Leave the event unapplied so redelivery can
                    // succeed once the activation lands.
                    tx.rollback()
                        .await
                        .map_err(|e| db_err("failed to rollback", e))?;
                    return Ok(ApplyOutcome::Rejected(RejectReason::NoRecordForUser));
                }
                EntitlementRecord::freemium(user_id.clone(), event_at)
            }
        };

        let change = record.apply(event_id, event_at, mutation);

        sqlx::query(
            r#"
            INSERT INTO entitlements (
                user_id, tier, tier_effective_at, external_customer_id,
                external_subscription_id, last_applied_event_id,
                last_applied_event_at, grace_until, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (user_id) DO UPDATE SET
                tier = EXCLUDED.tier,
                tier_effective_at = EXCLUDED.tier_effective_at,
                external_customer_id = EXCLUDED.external_customer_id,
                external_subscription_id = EXCLUDED.external_subscription_id,
                last_applied_event_id = EXCLUDED.last_applied_event_id,
                last_applied_event_at = EXCLUDED.last_applied_event_at,
                grace_until = EXCLUDED.grace_until,
                updated_at = now()
            "#,
        )
        .bind(record.user_id.as_str())
        .bind(record.tier.as_str())
        .bind(record.tier_effective_at.as_datetime())
        .bind(&record.external_customer_id)
        .bind(&record.external_subscription_id)
        .bind(record.last_applied_event_id.as_ref().map(|id| id.as_str()))
        .bind(record.last_applied_event_at.map(|t| *t.as_datetime()))
        .bind(record.grace_until.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("failed to upsert entitlement", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("failed to commit", e))?;

        Ok(ApplyOutcome::Applied(change))
    }

    async fn increment_usage(
        &self,
        user_id: &UserId,
        day: UsageDay,
        limit: u32,
    ) -> Result<UsageDecision, StoreError> {
        // The insert arm would bypass the limit check for a zero limit.
        if limit == 0 {
            return Ok(UsageDecision::Denied);
        }

        // Single conditional upsert: the WHERE clause on the update arm
        // makes this the atomic check-and-increment.
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            INSERT INTO usage_counters (user_id, day, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, day) DO UPDATE
                SET count = usage_counters.count + 1
                WHERE usage_counters.count < $3
            RETURNING count
            "#,
        )
        .bind(user_id.as_str())
        .bind(day.as_naive_date())
        .bind(limit as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("failed to increment usage", e))?;

        match row {
            Some((count,)) => Ok(UsageDecision::Allowed {
                count: count as u32,
            }),
            // The update arm's WHERE filtered the row out: at limit.
            None => Ok(UsageDecision::Denied),
        }
    }
}

//! PostgreSQL-backed notification store.
//!
//! Table structure (created by `postgres::ensure_schema`):
//! - `auth_notifications` - one row per dedup key, primary key on
//!   `(resource_id, authorisation_type, expiry_date, kind)`
//! - `notification_attempts` - append-only batch delivery history
//!
//! The primary key makes `INSERT ... ON CONFLICT DO NOTHING` the conditional
//! write that keeps claim-then-send atomic across service instances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::store::{
    AttemptStatus, ClaimOutcome, NotificationAttempt, NotificationKey, NotificationRecord, NotificationStatus, NotificationStore,
    StoreError,
};

pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_status(raw: &str) -> NotificationStatus {
    if raw == NotificationStatus::Sent.as_str() {
        NotificationStatus::Sent
    } else {
        NotificationStatus::Pending
    }
}

fn parse_attempt_status(raw: &str) -> AttemptStatus {
    if raw == AttemptStatus::Sent.as_str() {
        AttemptStatus::Sent
    } else {
        AttemptStatus::Failed
    }
}

type AttemptRow = (
    String,
    Option<String>,
    String,
    i64,
    Option<String>,
    DateTime<Utc>,
);

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn has_notified(&self, key: &NotificationKey) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM auth_notifications
                WHERE resource_id = $1 AND authorisation_type = $2
                  AND expiry_date = $3 AND kind = $4
            )
            "#,
        )
        .bind(&key.resource_id)
        .bind(key.authorisation_type)
        .bind(key.expiry_date)
        .bind(key.kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn try_claim(&self, key: &NotificationKey) -> Result<ClaimOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO auth_notifications
                (resource_id, authorisation_type, expiry_date, kind, status, claimed_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (resource_id, authorisation_type, expiry_date, kind) DO NOTHING
            "#,
        )
        .bind(&key.resource_id)
        .bind(key.authorisation_type)
        .bind(key.expiry_date)
        .bind(key.kind.as_str())
        .bind(NotificationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(ClaimOutcome::Claimed)
        } else {
            tracing::debug!(
                resource_id = %key.resource_id,
                expiry = %key.expiry_date,
                "Notification already claimed or sent"
            );
            Ok(ClaimOutcome::AlreadyNotified)
        }
    }

    async fn record_sent(
        &self,
        key: &NotificationKey,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_notifications
                (resource_id, authorisation_type, expiry_date, kind, status, claimed_at, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (resource_id, authorisation_type, expiry_date, kind) DO UPDATE
                SET status = EXCLUDED.status,
                    sent_at = COALESCE(auth_notifications.sent_at, EXCLUDED.sent_at)
            "#,
        )
        .bind(&key.resource_id)
        .bind(key.authorisation_type)
        .bind(key.expiry_date)
        .bind(key.kind.as_str())
        .bind(NotificationStatus::Sent.as_str())
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn release(&self, key: &NotificationKey) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM auth_notifications
            WHERE resource_id = $1 AND authorisation_type = $2
              AND expiry_date = $3 AND kind = $4 AND status = $5
            "#,
        )
        .bind(&key.resource_id)
        .bind(key.authorisation_type)
        .bind(key.expiry_date)
        .bind(key.kind.as_str())
        .bind(NotificationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &NotificationKey) -> Result<Option<NotificationRecord>, StoreError> {
        let row: Option<(String, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT status, claimed_at, sent_at
            FROM auth_notifications
            WHERE resource_id = $1 AND authorisation_type = $2
              AND expiry_date = $3 AND kind = $4
            "#,
        )
        .bind(&key.resource_id)
        .bind(key.authorisation_type)
        .bind(key.expiry_date)
        .bind(key.kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(status, claimed_at, sent_at)| NotificationRecord {
            key: key.clone(),
            status: parse_status(&status),
            claimed_at,
            sent_at,
        }))
    }

    async fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notification_attempts
                (resource_id, recipient, status, record_count, error, attempted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&attempt.resource_id)
        .bind(attempt.recipient.as_deref())
        .bind(attempt.status.as_str())
        .bind(attempt.record_count as i64)
        .bind(attempt.error.as_deref())
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn attempts_for(&self, resource_id: &str) -> Result<Vec<NotificationAttempt>, StoreError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT resource_id, recipient, status, record_count, error, attempted_at
            FROM notification_attempts
            WHERE resource_id = $1
            ORDER BY id
            "#,
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(resource_id, recipient, status, record_count, error, attempted_at)| {
                    NotificationAttempt {
                        resource_id,
                        recipient,
                        status: parse_attempt_status(&status),
                        record_count: usize::try_from(record_count).unwrap_or_default(),
                        error,
                        attempted_at,
                    }
                },
            )
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

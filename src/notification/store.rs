//! Backend trait for notification bookkeeping.
//!
//! The store is the single owner of `NotificationRecord` lifecycle. A record
//! is claimed (`pending`) before an email goes out and marked `sent` once the
//! provider accepts it, so two overlapping runs can never both send for the
//! same key.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::AuthorisationRecord;

/// Errors that can occur during notification store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),
}

/// Kind of notification; part of the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ExpiringSoon,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ExpiringSoon => "expiring_soon",
        }
    }
}

/// Dedup key: one notification per person, authorisation type, expiry date and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub resource_id: String,
    pub authorisation_type: i64,
    pub expiry_date: NaiveDate,
    pub kind: NotificationKind,
}

impl NotificationKey {
    pub fn new(
        resource_id: impl Into<String>,
        authorisation_type: i64,
        expiry_date: NaiveDate,
        kind: NotificationKind,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            authorisation_type,
            expiry_date,
            kind,
        }
    }

    /// Key for an expiring-soon notice; `None` when the record has no expiry.
    pub fn expiring_soon(record: &AuthorisationRecord) -> Option<Self> {
        record.expiry_date().map(|expiry| {
            Self::new(
                record.resource_id.clone(),
                record.authorisation_type(),
                expiry,
                NotificationKind::ExpiringSoon,
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Claimed by an in-flight run; email not yet confirmed
    Pending,
    Sent,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
        }
    }
}

/// Bookkeeping entry for one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub key: NotificationKey,
    pub status: NotificationStatus,
    pub claimed_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Sent,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Sent => "sent",
            AttemptStatus::Failed => "failed",
        }
    }
}

/// One batch email attempt for a person, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAttempt {
    pub resource_id: String,
    /// Unknown when the failure happened before recipient lookup
    pub recipient: Option<String>,
    pub status: AttemptStatus,
    /// Records covered by the email
    pub record_count: usize,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl NotificationAttempt {
    pub fn sent(resource_id: &str, recipient: &str, record_count: usize) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            recipient: Some(recipient.to_string()),
            status: AttemptStatus::Sent,
            record_count,
            error: None,
            attempted_at: Utc::now(),
        }
    }

    pub fn failed(
        resource_id: &str,
        recipient: Option<String>,
        record_count: usize,
        error: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            recipient,
            status: AttemptStatus::Failed,
            record_count,
            error: Some(error.into()),
            attempted_at: Utc::now(),
        }
    }
}

/// Result of attempting to claim a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Caller now owns the key and may send
    Claimed,
    /// A pending or sent record already exists
    AlreadyNotified,
}

/// Backend trait for notification storage.
///
/// # Thread Safety
///
/// Implementations are shared across request handlers and must make
/// `try_claim` atomic per key: a conditional insert that fails if the key
/// exists.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Backend identifier for logs and readiness output.
    fn backend_type(&self) -> &'static str;

    /// True when a pending or sent record exists for `key`.
    async fn has_notified(&self, key: &NotificationKey) -> Result<bool, StoreError>;

    /// Atomically insert a pending record unless one already exists.
    async fn try_claim(&self, key: &NotificationKey) -> Result<ClaimOutcome, StoreError>;

    /// Mark `key` as sent at `sent_at`.
    ///
    /// Idempotent: repeated calls leave a single record and keep the first
    /// timestamp.
    async fn record_sent(
        &self,
        key: &NotificationKey,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Drop a pending claim after a failed send so a later run may retry.
    ///
    /// Sent records are never removed.
    async fn release(&self, key: &NotificationKey) -> Result<(), StoreError>;

    /// Fetch the record for `key`, if any.
    async fn get(&self, key: &NotificationKey) -> Result<Option<NotificationRecord>, StoreError>;

    /// Append one delivery attempt to the audit history.
    async fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<(), StoreError>;

    /// Attempts for `resource_id`, oldest first.
    async fn attempts_for(&self, resource_id: &str) -> Result<Vec<NotificationAttempt>, StoreError>;

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

//! In-memory notification store using DashMap.
//!
//! State is lost on restart; suitable for single-instance runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::store::{
    ClaimOutcome, NotificationAttempt, NotificationKey, NotificationRecord, NotificationStatus, NotificationStore,
    StoreError,
};

#[derive(Default)]
pub struct MemoryNotificationStore {
    records: DashMap<NotificationKey, NotificationRecord>,
    attempts: DashMap<String, Vec<NotificationAttempt>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, pending or sent.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records in the `sent` state.
    pub fn sent_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == NotificationStatus::Sent)
            .count()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn has_notified(&self, key: &NotificationKey) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(key))
    }

    async fn try_claim(&self, key: &NotificationKey) -> Result<ClaimOutcome, StoreError> {
        // The entry holds the shard lock, so check and insert are one step
        match self.records.entry(key.clone()) {
            Entry::Occupied(_) => Ok(ClaimOutcome::AlreadyNotified),
            Entry::Vacant(slot) => {
                slot.insert(NotificationRecord {
                    key: key.clone(),
                    status: NotificationStatus::Pending,
                    claimed_at: Utc::now(),
                    sent_at: None,
                });
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn record_sent(
        &self,
        key: &NotificationKey,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.records
            .entry(key.clone())
            .and_modify(|record| {
                if record.status == NotificationStatus::Pending {
                    record.status = NotificationStatus::Sent;
                    record.sent_at = Some(sent_at);
                }
            })
            .or_insert_with(|| NotificationRecord {
                key: key.clone(),
                status: NotificationStatus::Sent,
                claimed_at: sent_at,
                sent_at: Some(sent_at),
            });

        tracing::trace!(resource_id = %key.resource_id, expiry = %key.expiry_date, "Recorded sent notification");
        Ok(())
    }

    async fn release(&self, key: &NotificationKey) -> Result<(), StoreError> {
        self.records
            .remove_if(key, |_, record| record.status == NotificationStatus::Pending);
        Ok(())
    }

    async fn get(&self, key: &NotificationKey) -> Result<Option<NotificationRecord>, StoreError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<(), StoreError> {
        self.attempts
            .entry(attempt.resource_id.clone())
            .or_default()
            .push(attempt.clone());
        Ok(())
    }

    async fn attempts_for(&self, resource_id: &str) -> Result<Vec<NotificationAttempt>, StoreError> {
        Ok(self
            .attempts
            .get(resource_id)
            .map(|a| a.value().clone())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

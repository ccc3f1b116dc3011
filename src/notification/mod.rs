//! Notification bookkeeping for deduplicated sends.
//!
//! # Store Backends
//!
//! - `MemoryNotificationStore`: DashMap-backed, process-local (default)
//! - `PostgresNotificationStore`: durable, shared between instances
//!
//! Use `create_notification_store()` to pick the backend from configuration.

mod memory_store;
mod postgres_store;
mod store;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::DatabaseConfig;

pub use memory_store::MemoryNotificationStore;
pub use postgres_store::PostgresNotificationStore;
pub use store::{
    AttemptStatus, ClaimOutcome, NotificationAttempt, NotificationKey, NotificationKind, NotificationRecord, NotificationStatus,
    NotificationStore, StoreError,
};

/// Create a notification store based on configuration.
///
/// - `"postgres"`: `PostgresNotificationStore` when a pool is provided
/// - `"memory"` (default): `MemoryNotificationStore`
pub fn create_notification_store(
    settings: &DatabaseConfig,
    pool: Option<PgPool>,
) -> Arc<dyn NotificationStore> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL notification store");
                Arc::new(PostgresNotificationStore::new(pool))
            } else {
                tracing::warn!(
                    "PostgreSQL notification store requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryNotificationStore::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory notification store");
            Arc::new(MemoryNotificationStore::new())
        }
    }
}

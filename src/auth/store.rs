//! API user storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use thiserror::Error;

use super::api_key::{hash_api_key, ApiUser};

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("invalid API user entry '{0}': expected name:sha256hex")]
    InvalidSeed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
        }
    }
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Look up the user owning `api_key_hash`.
    async fn find_by_hash(&self, api_key_hash: &str) -> Result<Option<ApiUser>, ApiKeyError>;

    /// Create `name`, or replace its key hash if it already exists.
    async fn upsert_user(&self, name: &str, api_key_hash: &str)
        -> Result<UpsertOutcome, ApiKeyError>;

    async fn ping(&self) -> Result<(), ApiKeyError>;
}

/// Hash a presented key and resolve its owner.
pub async fn resolve_api_key(
    store: &dyn ApiKeyStore,
    api_key: &str,
) -> Result<Option<ApiUser>, ApiKeyError> {
    store.find_by_hash(&hash_api_key(api_key)).await
}

/// Process-local user store keyed by name.
#[derive(Default)]
pub struct MemoryApiKeyStore {
    users: DashMap<String, ApiUser>,
}

impl MemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
    async fn find_by_hash(&self, api_key_hash: &str) -> Result<Option<ApiUser>, ApiKeyError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.api_key_hash == api_key_hash)
            .map(|u| u.value().clone()))
    }

    async fn upsert_user(
        &self,
        name: &str,
        api_key_hash: &str,
    ) -> Result<UpsertOutcome, ApiKeyError> {
        let user = ApiUser {
            name: name.to_string(),
            api_key_hash: api_key_hash.to_string(),
            created_at: Utc::now(),
        };
        match self.users.insert(name.to_string(), user) {
            Some(_) => Ok(UpsertOutcome::Updated),
            None => Ok(UpsertOutcome::Created),
        }
    }

    async fn ping(&self) -> Result<(), ApiKeyError> {
        Ok(())
    }
}

/// `api_users` table (see `postgres::ensure_schema`).
pub struct PostgresApiKeyStore {
    pool: PgPool,
}

impl PostgresApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PostgresApiKeyStore {
    async fn find_by_hash(&self, api_key_hash: &str) -> Result<Option<ApiUser>, ApiKeyError> {
        let row: Option<(String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT name, api_key_hash, created_at FROM api_users WHERE api_key_hash = $1",
        )
        .bind(api_key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(name, api_key_hash, created_at)| ApiUser {
            name,
            api_key_hash,
            created_at,
        }))
    }

    async fn upsert_user(
        &self,
        name: &str,
        api_key_hash: &str,
    ) -> Result<UpsertOutcome, ApiKeyError> {
        // xmax is zero only for freshly inserted rows
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO api_users (name, api_key_hash, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE
                SET api_key_hash = EXCLUDED.api_key_hash, created_at = NOW()
            RETURNING (xmax = 0)
            "#,
        )
        .bind(name)
        .bind(api_key_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn ping(&self) -> Result<(), ApiKeyError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_known_key() {
        let store = MemoryApiKeyStore::new();
        store
            .upsert_user("scheduler", &hash_api_key("plain-key"))
            .await
            .unwrap();

        let user = resolve_api_key(&store, "plain-key").await.unwrap().unwrap();
        assert_eq!(user.name, "scheduler");

        assert!(resolve_api_key(&store, "other-key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_key() {
        let store = MemoryApiKeyStore::new();

        let first = store.upsert_user("ops", &hash_api_key("old")).await.unwrap();
        let second = store.upsert_user("ops", &hash_api_key("new")).await.unwrap();

        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(second, UpsertOutcome::Updated);
        assert!(resolve_api_key(&store, "old").await.unwrap().is_none());
        assert!(resolve_api_key(&store, "new").await.unwrap().is_some());
    }
}

//! API key authentication: hashing, issuance and user storage.

mod api_key;
mod seed;
mod store;

use std::sync::Arc;

use sqlx::PgPool;

pub use api_key::{generate_api_key, hash_api_key, ApiUser, API_KEY_LENGTH};
pub use seed::{seed_api_users, ApiUserSeed};
pub use store::{
    resolve_api_key, ApiKeyError, ApiKeyStore, MemoryApiKeyStore, PostgresApiKeyStore,
    UpsertOutcome,
};

/// Pick the user store matching the notification store backend.
pub fn create_api_key_store(pool: Option<PgPool>) -> Arc<dyn ApiKeyStore> {
    match pool {
        Some(pool) => Arc::new(PostgresApiKeyStore::new(pool)),
        None => Arc::new(MemoryApiKeyStore::new()),
    }
}

//! API users provisioned from configuration (`auth.api_keys`).

use super::store::{ApiKeyError, ApiKeyStore};

/// One `name:sha256hex` entry. Only the hash is configured, never the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiUserSeed {
    pub name: String,
    pub api_key_hash: String,
}

impl ApiUserSeed {
    pub fn parse(entry: &str) -> Result<Self, ApiKeyError> {
        let invalid = || ApiKeyError::InvalidSeed(entry.to_string());

        let (name, hash) = entry.trim().split_once(':').ok_or_else(invalid)?;
        let (name, hash) = (name.trim(), hash.trim());
        if name.is_empty() || hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            api_key_hash: hash.to_ascii_lowercase(),
        })
    }
}

/// Parse every entry first, then upsert them. Returns the number of users written.
pub async fn seed_api_users(
    store: &dyn ApiKeyStore,
    entries: &[String],
) -> Result<usize, ApiKeyError> {
    let seeds = entries
        .iter()
        .filter(|e| !e.trim().is_empty())
        .map(|e| ApiUserSeed::parse(e))
        .collect::<Result<Vec<_>, _>>()?;

    for seed in &seeds {
        let outcome = store.upsert_user(&seed.name, &seed.api_key_hash).await?;
        tracing::debug!(user = %seed.name, outcome = outcome.as_str(), "API user seeded");
    }

    Ok(seeds.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_api_key, resolve_api_key, MemoryApiKeyStore};

    #[test]
    fn test_parse_entry() {
        let hash = hash_api_key("secret");
        let seed = ApiUserSeed::parse(&format!(" scheduler:{} ", hash.to_uppercase())).unwrap();

        assert_eq!(seed.name, "scheduler");
        assert_eq!(seed.api_key_hash, hash);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ApiUserSeed::parse("scheduler").is_err());
        assert!(ApiUserSeed::parse(&format!(":{}", hash_api_key("k"))).is_err());
        assert!(ApiUserSeed::parse("scheduler:plain-key").is_err());
        assert!(ApiUserSeed::parse(&format!("ops:{}", "z".repeat(64))).is_err());
    }

    #[tokio::test]
    async fn test_seeded_key_resolves() {
        let store = MemoryApiKeyStore::new();
        let entries = vec![
            format!("scheduler:{}", hash_api_key("key-one")),
            String::new(),
            format!("ops:{}", hash_api_key("key-two")),
        ];

        let seeded = seed_api_users(&store, &entries).await.unwrap();

        assert_eq!(seeded, 2);
        let user = resolve_api_key(&store, "key-two").await.unwrap().unwrap();
        assert_eq!(user.name, "ops");
    }

    #[tokio::test]
    async fn test_bad_entry_writes_nothing() {
        let store = MemoryApiKeyStore::new();
        let entries = vec![
            format!("scheduler:{}", hash_api_key("key-one")),
            "broken".to_string(),
        ];

        let result = seed_api_users(&store, &entries).await;

        assert!(matches!(result, Err(ApiKeyError::InvalidSeed(e)) if e == "broken"));
        assert!(resolve_api_key(&store, "key-one").await.unwrap().is_none());
    }
}

//! API key issuance and hashing.
//!
//! Only the SHA-256 hex digest of a key is ever stored; the plaintext is shown
//! once at creation and cannot be recovered.

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length of generated keys (alphanumeric, ~190 bits of entropy)
pub const API_KEY_LENGTH: usize = 32;

/// API caller identified by the hash of its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiUser {
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Hex-encoded SHA-256 of `api_key`.
pub fn hash_api_key(api_key: &str) -> String {
    let digest = Sha256::digest(api_key.as_bytes());
    format!("{:x}", digest)
}

/// Generate a fresh random API key.
pub fn generate_api_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_is_deterministic_and_distinct() {
        assert_eq!(hash_api_key("key-one"), hash_api_key("key-one"));
        assert_ne!(hash_api_key("key-one"), hash_api_key("key-two"));
    }

    #[test]
    fn test_generated_keys() {
        let a = generate_api_key();
        let b = generate_api_key();

        assert_eq!(a.len(), API_KEY_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_never_serialized() {
        let user = ApiUser {
            name: "scheduler".to_string(),
            api_key_hash: hash_api_key("secret"),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("scheduler"));
        assert!(!json.contains(&user.api_key_hash));
    }
}

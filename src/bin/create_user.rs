//! Issue an API key for a named caller.
//!
//! Usage: `create_user --name <name>`
//!
//! The plaintext key is printed once; only its SHA-256 hash is stored.
//! Running it again for an existing name replaces that user's key.
//!
//! Without a database URL nothing is stored; the `auth.api_keys` entry for
//! the memory backend is printed instead.

use anyhow::{bail, Context, Result};

use stars_expiry_notifier::auth::{
    generate_api_key, hash_api_key, ApiKeyStore, PostgresApiKeyStore,
};
use stars_expiry_notifier::config::Settings;
use stars_expiry_notifier::postgres;

const USAGE: &str = "Usage: create_user --name <name>";

fn parse_name(args: impl IntoIterator<Item = String>) -> Result<String> {
    let mut args = args.into_iter();
    let mut name = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--name" | "-n" => name = args.next(),
            "--help" | "-h" => bail!(USAGE),
            other => match other.strip_prefix("--name=") {
                Some(value) => name = Some(value.to_string()),
                None => bail!("unexpected argument '{}'\n{}", other, USAGE),
            },
        }
    }

    match name.map(|n| n.trim().to_string()) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => bail!(USAGE),
    }
}

fn config_entry(name: &str, api_key: &str) -> String {
    format!("{}:{}", name, hash_api_key(api_key))
}

#[tokio::main]
async fn main() -> Result<()> {
    let name = parse_name(std::env::args().skip(1))?;

    let database = Settings::database_only().context("failed to load database configuration")?;
    let api_key = generate_api_key();

    if database.url.is_none() {
        println!("No DATABASE_URL set; add this entry to auth.api_keys (AUTH__API_KEYS):");
        println!("  {}", config_entry(&name, &api_key));
        println!("API key (shown once, store it securely): {}", api_key);
        return Ok(());
    }

    let pool = postgres::connect(&database).await?;
    postgres::ensure_schema(&pool).await?;
    let store = PostgresApiKeyStore::new(pool);

    let outcome = store.upsert_user(&name, &hash_api_key(&api_key)).await?;

    println!("User '{}' {}.", name, outcome.as_str());
    println!("API key (shown once, store it securely): {}", api_key);
    Ok(())
}

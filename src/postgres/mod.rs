//! PostgreSQL persistence module.
//!
//! Provides connection pooling and schema bootstrap for the Postgres-backed
//! notification and API key stores.

pub mod pool;

pub use pool::{connect, ensure_schema, mask_database_url, PostgresPoolError};

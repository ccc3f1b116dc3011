//! STARS authorisation registry: record types and client.

mod client;
mod types;

pub use client::{AuthorisationRegistry, RegistryError, RegistryScope, StarsClient};
pub use types::{AuthorisationRecord, Person, Recipient, User};

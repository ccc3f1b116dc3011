//! STARS registry access.
//!
//! `AuthorisationRegistry` is the seam the workflow depends on; `StarsClient`
//! implements it over the registry's REST API with `reqwest`. Failures are
//! surfaced as `RegistryError` and never retried here: the external scheduler
//! owns retries by re-invoking the endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header, Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::RegistryConfig;
use crate::metrics::RegistryMetrics;

use super::types::{AuthorisationRecord, Envelope, Person, Recipient, User};

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Network failure, timeout or 5xx from the registry
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// Registry refused our credentials
    #[error("registry rejected credentials (status {0})")]
    Unauthorized(u16),

    #[error("registry returned status {0}")]
    Status(u16),

    #[error("not found in registry: {0}")]
    NotFound(String),

    #[error("unexpected registry response: {0}")]
    Decode(String),

    #[error("registry not configured: {0}")]
    NotConfigured(String),
}

/// Which slice of the registry to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryScope {
    /// Every person in an organisational unit
    Unit(String),
    /// One person, restricted to records of the given unit
    Resource { resource_id: String, unit_id: String },
}

impl RegistryScope {
    /// Resolve request filters, falling back to `default_unit`.
    ///
    /// Returns `None` when neither a unit nor a resource can be determined.
    pub fn resolve(
        unit_id: Option<&str>,
        resource_id: Option<&str>,
        default_unit: &str,
    ) -> Option<Self> {
        fn non_empty(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }

        let unit = non_empty(unit_id)
            .or_else(|| non_empty(Some(default_unit)))
            .map(str::to_string);

        match (non_empty(resource_id), unit) {
            (Some(resource_id), Some(unit_id)) => Some(RegistryScope::Resource {
                resource_id: resource_id.to_string(),
                unit_id,
            }),
            (Some(_), None) => None,
            (None, Some(unit_id)) => Some(RegistryScope::Unit(unit_id)),
            (None, None) => None,
        }
    }

    pub fn unit_id(&self) -> &str {
        match self {
            RegistryScope::Unit(unit_id) => unit_id,
            RegistryScope::Resource { unit_id, .. } => unit_id,
        }
    }
}

/// Read-only access to the authorisation registry.
#[async_trait]
pub trait AuthorisationRegistry: Send + Sync {
    /// Fetch candidate records for `scope` expiring no later than `horizon`.
    ///
    /// The registry may return records outside the warning window; callers
    /// must still run them through the expiry evaluator.
    async fn fetch_expiring(
        &self,
        scope: &RegistryScope,
        as_of: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<Vec<AuthorisationRecord>, RegistryError>;

    /// Resolve the person behind `resource_id` to an email recipient.
    async fn recipient_for(&self, resource_id: &str) -> Result<Recipient, RegistryError>;

    /// Cheap readiness probe; must not hit the network.
    fn check_ready(&self) -> Result<(), RegistryError>;
}

/// `reqwest`-backed STARS client.
pub struct StarsClient {
    base_url: Url,
    api_key: String,
    client: Client,
}

impl StarsClient {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let base_url = Url::parse(config.uri.trim_end_matches('/'))
            .map_err(|e| RegistryError::NotConfigured(format!("invalid registry URI: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::NotConfigured(
                "registry URI cannot be used as a base".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            client,
        })
    }

    /// Build `<base>/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, RegistryError> {
        let result = self.send(url, query).await;
        match &result {
            Ok(_) => RegistryMetrics::record_ok(),
            Err(_) => RegistryMetrics::record_error(),
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, RegistryError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::AUTHORIZATION, &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, path = %url.path(), "Registry request failed");
                RegistryError::Unavailable(e.to_string())
            })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::error!(status = %response.status(), "Registry rejected credentials");
                return Err(RegistryError::Unauthorized(response.status().as_u16()));
            }
            status if status.is_server_error() => {
                return Err(RegistryError::Unavailable(format!("status {}", status)));
            }
            status => return Err(RegistryError::Status(status.as_u16())),
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))?;

        Ok(envelope.data)
    }

    pub async fn get_person(&self, person_id: &str) -> Result<Person, RegistryError> {
        tracing::debug!(person_id = %person_id, "Fetching person");
        let url = self.endpoint(&["person", "personnel"]);
        self.get_data::<Person>(url, &[("ids", person_id.to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::NotFound(format!("person {}", person_id)))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, RegistryError> {
        tracing::debug!(user_id = %user_id, "Fetching user");
        // The registry expects the trailing slash on this collection
        let url = self.endpoint(&["user", "users", ""]);
        self.get_data::<User>(url, &[("ids", user_id.to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::NotFound(format!("user {}", user_id)))
    }
}

#[async_trait]
impl AuthorisationRegistry for StarsClient {
    async fn fetch_expiring(
        &self,
        scope: &RegistryScope,
        as_of: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<Vec<AuthorisationRecord>, RegistryError> {
        match scope {
            RegistryScope::Unit(unit_id) => {
                tracing::info!(unit_id = %unit_id, horizon = %horizon, "Fetching expiring auths for unit");
                let url = self.endpoint(&["eng", "personnel", "auths"]);
                let records = self
                    .get_data::<AuthorisationRecord>(
                        url,
                        &[
                            ("view", "Expiring".to_string()),
                            ("trade", String::new()),
                            ("baseDate", horizon.format("%Y-%m-%d").to_string()),
                            ("orgUnitID", unit_id.clone()),
                        ],
                    )
                    .await?;
                tracing::info!(count = records.len(), unit_id = %unit_id, "Retrieved expiring auths");
                Ok(records)
            }
            RegistryScope::Resource {
                resource_id,
                unit_id,
            } => {
                tracing::info!(resource_id = %resource_id, unit_id = %unit_id, "Fetching current auths for resource");
                let url = self.endpoint(&["eng", "personnel", resource_id, "auths"]);
                let records = self
                    .get_data::<AuthorisationRecord>(
                        url,
                        &[
                            ("view", "Current".to_string()),
                            ("baseDate", as_of.format("%Y-%m-%d").to_string()),
                        ],
                    )
                    .await?;
                Ok(records
                    .into_iter()
                    .filter(|r| r.belongs_to_unit(unit_id))
                    .filter(|r| r.expiry.is_some_and(|d| d <= horizon))
                    .collect())
            }
        }
    }

    async fn recipient_for(&self, resource_id: &str) -> Result<Recipient, RegistryError> {
        let person = self.get_person(resource_id).await?;
        let user = self.get_user(&person.user_id).await?;

        tracing::debug!(resource_id = %resource_id, user_id = %user.id, "Resolved recipient");
        Ok(Recipient {
            user_id: user.id,
            name: person.display_name.unwrap_or(person.name),
            email: user.email,
        })
    }

    fn check_ready(&self) -> Result<(), RegistryError> {
        if self.api_key.trim().is_empty() {
            return Err(RegistryError::NotConfigured("missing API key".to_string()));
        }
        Ok(())
    }
}

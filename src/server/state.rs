use std::sync::Arc;
use std::time::Instant;

use config::ConfigError;
use sqlx::PgPool;

use crate::auth::{create_api_key_store, seed_api_users, ApiKeyStore};
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::notification::create_notification_store;
use crate::notifier::SendGridNotifier;
use crate::registry::StarsClient;
use crate::workflow::ExpiryWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub workflow: Arc<ExpiryWorkflow>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, workflow: ExpiryWorkflow, api_keys: Arc<dyn ApiKeyStore>) -> Self {
        Self {
            settings: Arc::new(settings),
            workflow: Arc::new(workflow),
            api_keys,
            start_time: Instant::now(),
        }
    }

    /// Build the production state: STARS client, SendGrid notifier, stores on
    /// `pool` when given (memory otherwise) and the configured API users.
    ///
    /// Without a pool the user store lives only in this process, so at least
    /// one `auth.api_keys` entry is required or every request would be 401.
    pub async fn from_settings(settings: Settings, pool: Option<PgPool>) -> Result<Self> {
        let persistent_users = pool.is_some();

        let store = create_notification_store(&settings.database, pool.clone());
        let api_keys = create_api_key_store(pool);
        let seeded = seed_api_users(api_keys.as_ref(), &settings.auth.api_keys)
            .await
            .map_err(|e| AppError::Config(ConfigError::Message(e.to_string())))?;

        if seeded == 0 && !persistent_users {
            return Err(AppError::Config(ConfigError::Message(
                "no API users: set auth.api_keys (AUTH__API_KEYS=name:sha256hex) \
                 or use the postgres backend with create_user"
                    .to_string(),
            )));
        }
        tracing::info!(seeded, persistent = persistent_users, "API users loaded");

        let registry = Arc::new(StarsClient::new(&settings.registry)?);
        let notifier = Arc::new(SendGridNotifier::new(settings.email.clone())?);

        let workflow = ExpiryWorkflow::new(
            registry,
            store,
            notifier,
            settings.registry.org_unit_id.clone(),
            settings.notify.expiry_warning_days,
        );

        Ok(Self::new(settings, workflow, api_keys))
    }
}

//! Fake registry and notifier shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Barrier;

use stars_expiry_notifier::config::{
    AuthConfig, DatabaseConfig, EmailConfig, NotifyConfig, OtelConfig, RegistryConfig,
    ServerConfig, Settings,
};
use stars_expiry_notifier::notification::{MemoryNotificationStore, NotificationStore};
use stars_expiry_notifier::notifier::{ExpiryNotice, Notifier, SendError};
use stars_expiry_notifier::registry::{
    AuthorisationRecord, AuthorisationRegistry, Recipient, RegistryError, RegistryScope,
};
use stars_expiry_notifier::workflow::ExpiryWorkflow;

pub const UNIT: &str = "206749";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn today() -> NaiveDate {
    date(2024, 1, 1)
}

pub fn record(id: i64, resource_id: &str, expiry: NaiveDate) -> AuthorisationRecord {
    AuthorisationRecord {
        id,
        map_id: 3000 + id,
        map_name: format!("AUTH{:02} Test Authorisation", id),
        state: Some("Current".to_string()),
        currency_state: None,
        map_level: None,
        resource_id: resource_id.to_string(),
        resource_name: format!("Person {}", resource_id),
        resource_rank: None,
        org_unit_id: 206749,
        org_unit: Some("661 VGS".to_string()),
        completed: None,
        expiry: Some(expiry),
    }
}

pub fn email_for(resource_id: &str) -> String {
    format!("{}@example.com", resource_id.replace(':', "").to_lowercase())
}

/// Serves a fixed record set; can be switched to fail.
#[derive(Default)]
pub struct FakeRegistry {
    pub records: Mutex<Vec<AuthorisationRecord>>,
    pub fail_fetch: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub scopes: Mutex<Vec<RegistryScope>>,
    /// When set, every fetch waits here so concurrent runs all hold their
    /// records before any of them claims or sends.
    pub fetch_barrier: Option<Arc<Barrier>>,
}

impl FakeRegistry {
    pub fn with_records(records: Vec<AuthorisationRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AuthorisationRegistry for FakeRegistry {
    async fn fetch_expiring(
        &self,
        scope: &RegistryScope,
        _as_of: NaiveDate,
        _horizon: NaiveDate,
    ) -> Result<Vec<AuthorisationRecord>, RegistryError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.scopes.lock().unwrap().push(scope.clone());
        if let Some(barrier) = &self.fetch_barrier {
            barrier.wait().await;
        }
        tokio::task::yield_now().await;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("connection refused".to_string()));
        }

        let records = self.records.lock().unwrap().clone();
        Ok(match scope {
            RegistryScope::Unit(_) => records,
            RegistryScope::Resource { resource_id, .. } => records
                .into_iter()
                .filter(|r| &r.resource_id == resource_id)
                .collect(),
        })
    }

    async fn recipient_for(&self, resource_id: &str) -> Result<Recipient, RegistryError> {
        Ok(Recipient {
            user_id: format!("U-{}", resource_id),
            name: format!("Person {}", resource_id),
            email: email_for(resource_id),
        })
    }

    fn check_ready(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// Records every send; rejects addresses listed in `fail_for`.
#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<(String, ExpiryNotice)>>,
    pub fail_for: Mutex<HashSet<String>>,
}

impl FakeNotifier {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn fail_for(&self, email: &str) {
        self.fail_for.lock().unwrap().insert(email.to_string());
    }

    pub fn recover(&self, email: &str) {
        self.fail_for.lock().unwrap().remove(email);
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, email: &str, notice: &ExpiryNotice) -> Result<(), SendError> {
        // Hand the worker to other runs mid-batch, as a real HTTP send would
        tokio::task::yield_now().await;
        if self.fail_for.lock().unwrap().contains(email) {
            return Err(SendError::Rejected {
                status: 550,
                body: "mailbox unavailable".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), notice.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub registry: Arc<FakeRegistry>,
    pub notifier: Arc<FakeNotifier>,
    pub store: Arc<MemoryNotificationStore>,
}

impl Harness {
    pub fn new(records: Vec<AuthorisationRecord>) -> Self {
        Self {
            registry: Arc::new(FakeRegistry::with_records(records)),
            notifier: Arc::new(FakeNotifier::default()),
            store: Arc::new(MemoryNotificationStore::new()),
        }
    }

    /// Harness whose registry holds every fetch until `runs` fetches are in flight.
    pub fn overlapping(records: Vec<AuthorisationRecord>, runs: usize) -> Self {
        let registry = FakeRegistry {
            fetch_barrier: Some(Arc::new(Barrier::new(runs))),
            ..FakeRegistry::with_records(records)
        };
        Self {
            registry: Arc::new(registry),
            ..Self::new(Vec::new())
        }
    }

    pub fn workflow(&self) -> ExpiryWorkflow {
        self.workflow_with_store(self.store.clone())
    }

    /// Workflow over this harness's registry and notifier with another store.
    pub fn workflow_with_store(&self, store: Arc<dyn NotificationStore>) -> ExpiryWorkflow {
        ExpiryWorkflow::new(
            self.registry.clone(),
            store,
            self.notifier.clone(),
            UNIT,
            30,
        )
        .with_fixed_date(today())
    }
}

pub fn test_settings() -> Settings {
    Settings {
        server: ServerConfig::default(),
        registry: RegistryConfig {
            uri: "http://127.0.0.1:9/api".to_string(),
            api_key: "registry-key".to_string(),
            org_unit_id: UNIT.to_string(),
            timeout_seconds: 5,
        },
        email: EmailConfig {
            api_key: "sendgrid-key".to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: "STARS Expiry".to_string(),
            api_url: "http://127.0.0.1:9/v3/mail/send".to_string(),
            unsubscribe_group_id: None,
            timeout_seconds: 5,
        },
        notify: NotifyConfig::default(),
        database: DatabaseConfig::default(),
        otel: OtelConfig::default(),
        auth: AuthConfig::default(),
    }
}

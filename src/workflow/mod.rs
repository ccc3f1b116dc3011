//! Expiry workflow orchestration.
//!
//! `FETCH -> FILTER -> DEDUP -> SEND -> RECORD -> SUMMARIZE`
//!
//! The batch path claims every record key before sending so overlapping runs
//! cannot both email the same person about the same authorisation. The
//! single-user path skips DEDUP and RECORD and sends on every call. A registry
//! fetch failure aborts the run before anything is sent. Per-person delivery
//! or store failures are tallied and the batch continues. Every batch attempt
//! is appended to the store's audit history.

mod types;

use std::sync::Arc;
use std::time::Instant;

use chrono::{Days, Local, NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::expiry::{filter_expiring, group_by_resource, WarningWindow};
use crate::metrics::NotificationMetrics;
use crate::notification::{
    ClaimOutcome, NotificationAttempt, NotificationKey, NotificationStore, StoreError,
};
use crate::notifier::{ExpiryNotice, Notifier};
use crate::registry::{AuthorisationRecord, AuthorisationRegistry, RegistryScope};

pub use types::{
    ExpiringListResponse, ExpiringQuery, NotifyRequest, NotifyResponse, NotifySummary,
    TestEmailRequest, TestEmailResponse, UserNotifyRequest,
};

/// Days ahead of today used for the sample test-email authorisation
const TEST_EMAIL_DAYS_AHEAD: u64 = 15;
const TEST_EMAIL_SUBJECT: &str = "STARS Authorisations Expiring Soon - Test Email";
const TEST_EMAIL_AUTH_ID: i64 = 999999;
const TEST_EMAIL_MAP_ID: i64 = 3209;

/// Why one person's email did not go out.
#[derive(Debug)]
struct DeliveryError {
    recipient: Option<String>,
    message: String,
}

pub struct ExpiryWorkflow {
    registry: Arc<dyn AuthorisationRegistry>,
    store: Arc<dyn NotificationStore>,
    notifier: Arc<dyn Notifier>,
    default_unit: String,
    default_warning_days: u32,
    fixed_today: Option<NaiveDate>,
}

impl ExpiryWorkflow {
    pub fn new(
        registry: Arc<dyn AuthorisationRegistry>,
        store: Arc<dyn NotificationStore>,
        notifier: Arc<dyn Notifier>,
        default_unit: impl Into<String>,
        default_warning_days: u32,
    ) -> Self {
        Self {
            registry,
            store,
            notifier,
            default_unit: default_unit.into(),
            default_warning_days,
            fixed_today: None,
        }
    }

    /// Pin "today" to a fixed date instead of the local clock.
    pub fn with_fixed_date(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn registry(&self) -> &Arc<dyn AuthorisationRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    fn scope(&self, unit_id: Option<&str>, resource_id: Option<&str>) -> Result<RegistryScope> {
        RegistryScope::resolve(unit_id, resource_id, &self.default_unit).ok_or_else(|| {
            AppError::Validation(
                "unit_id is required when no default unit is configured".to_string(),
            )
        })
    }

    async fn fetch_qualifying(
        &self,
        scope: &RegistryScope,
        window: WarningWindow,
    ) -> Result<Vec<AuthorisationRecord>> {
        let today = self.today();
        let records = self
            .registry
            .fetch_expiring(scope, today, window.horizon(today))
            .await?;
        let fetched = records.len();
        let expiring = filter_expiring(records, window, today);

        tracing::debug!(
            unit_id = %scope.unit_id(),
            fetched,
            expiring = expiring.len(),
            warning_days = window.days(),
            "Filtered registry records"
        );
        Ok(expiring)
    }

    /// Batch run over a unit with deduplication.
    #[tracing::instrument(name = "workflow.check_and_notify", skip(self))]
    pub async fn check_and_notify(
        &self,
        unit_id: Option<&str>,
        warning_days: Option<i64>,
    ) -> Result<NotifyResponse> {
        let started = Instant::now();
        let window = WarningWindow::from_request(warning_days, self.default_warning_days)?;
        let scope = self.scope(unit_id, None)?;

        let expiring = self.fetch_qualifying(&scope, window).await?;
        let mut response = NotifyResponse::new(expiring.len());

        for (resource_id, group) in group_by_resource(expiring) {
            let record_count = group.len();
            let (fresh, keys, skipped) = match self.claim_group(group).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    // Claims taken for this person were released; nothing was sent
                    tracing::error!(resource_id = %resource_id, error = %e, "Failed to claim notifications");
                    let message = format!("{}: notification store error: {}", resource_id, e);
                    self.audit(NotificationAttempt::failed(
                        &resource_id,
                        None,
                        record_count,
                        message.as_str(),
                    ))
                    .await;
                    response.record_failed(message);
                    NotificationMetrics::record_failed();
                    continue;
                }
            };
            response.skipped_duplicate += skipped;
            if fresh.is_empty() {
                tracing::debug!(resource_id = %resource_id, skipped, "All records already notified");
                continue;
            }
            response.summary.users_notified += 1;

            match self.deliver(&resource_id, &fresh).await {
                Ok(recipient) => {
                    let sent_at = Utc::now();
                    for key in &keys {
                        // The email is out; a failed write leaves the claim pending, which still blocks resends
                        if let Err(e) = self.store.record_sent(key, sent_at).await {
                            tracing::error!(resource_id = %resource_id, error = %e, "Failed to record sent notification");
                            response
                                .errors
                                .push(format!("{}: failed to record notification: {}", resource_id, e));
                        }
                    }
                    self.audit(NotificationAttempt::sent(&resource_id, &recipient, fresh.len()))
                        .await;
                    response.record_sent(fresh.len());
                    NotificationMetrics::record_sent();
                }
                Err(failure) => {
                    for key in &keys {
                        if let Err(e) = self.store.release(key).await {
                            tracing::error!(resource_id = %resource_id, error = %e, "Failed to release notification claim");
                        }
                    }
                    self.audit(NotificationAttempt::failed(
                        &resource_id,
                        failure.recipient,
                        fresh.len(),
                        failure.message.as_str(),
                    ))
                    .await;
                    response.record_failed(failure.message);
                    NotificationMetrics::record_failed();
                }
            }
        }

        NotificationMetrics::record_skipped(response.skipped_duplicate as u64);
        NotificationMetrics::observe_duration("check_and_notify", started.elapsed().as_secs_f64());

        tracing::info!(
            unit_id = %scope.unit_id(),
            sent = response.sent,
            failed = response.failed,
            skipped_duplicate = response.skipped_duplicate,
            total_expiring = response.summary.total_expiring_auths,
            "Expiry check complete"
        );
        Ok(response)
    }

    /// Append to the audit history. A failed write is logged and does not
    /// change the run's outcome.
    async fn audit(&self, attempt: NotificationAttempt) {
        if let Err(e) = self.store.record_attempt(&attempt).await {
            tracing::warn!(resource_id = %attempt.resource_id, error = %e, "Failed to record notification attempt");
        }
    }

    /// Claim each record's key; returns the claimed records, their keys and the duplicate count.
    ///
    /// On a store error every claim taken so far is released.
    async fn claim_group(
        &self,
        group: Vec<AuthorisationRecord>,
    ) -> std::result::Result<(Vec<AuthorisationRecord>, Vec<NotificationKey>, usize), StoreError> {
        let mut fresh = Vec::with_capacity(group.len());
        let mut keys = Vec::with_capacity(group.len());
        let mut skipped = 0;

        for record in group {
            let Some(key) = NotificationKey::expiring_soon(&record) else {
                continue;
            };
            match self.store.try_claim(&key).await {
                Ok(ClaimOutcome::Claimed) => {
                    keys.push(key);
                    fresh.push(record);
                }
                Ok(ClaimOutcome::AlreadyNotified) => skipped += 1,
                Err(e) => {
                    for claimed in &keys {
                        if let Err(release_err) = self.store.release(claimed).await {
                            tracing::error!(error = %release_err, "Failed to release notification claim");
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok((fresh, keys, skipped))
    }

    /// Resolve the recipient and send one email covering `records`.
    ///
    /// Returns the address the email went to.
    async fn deliver(
        &self,
        resource_id: &str,
        records: &[AuthorisationRecord],
    ) -> std::result::Result<String, DeliveryError> {
        let recipient = self.registry.recipient_for(resource_id).await.map_err(|e| {
            tracing::warn!(resource_id = %resource_id, error = %e, "Could not resolve recipient");
            DeliveryError {
                recipient: None,
                message: format!("{}: {}", resource_id, e),
            }
        })?;

        if !recipient.email.contains('@') {
            tracing::warn!(resource_id = %resource_id, user_id = %recipient.user_id, "Recipient has no usable email address");
            return Err(DeliveryError {
                recipient: None,
                message: format!("{}: no email address on user {}", resource_id, recipient.user_id),
            });
        }

        let notice = ExpiryNotice::from_records(resource_id, records);
        match self.notifier.send(&recipient.email, &notice).await {
            Ok(()) => Ok(recipient.email),
            Err(e) => Err(DeliveryError {
                message: format!("{}: {}", resource_id, e),
                recipient: Some(recipient.email),
            }),
        }
    }

    /// Ad-hoc run for one person; never deduplicated.
    #[tracing::instrument(name = "workflow.notify_resource", skip(self))]
    pub async fn notify_resource(
        &self,
        resource_id: &str,
        unit_id: Option<&str>,
        warning_days: Option<i64>,
    ) -> Result<NotifyResponse> {
        let started = Instant::now();
        let resource_id = resource_id.trim();
        if resource_id.is_empty() {
            return Err(AppError::Validation("resource_id must not be empty".to_string()));
        }
        let window = WarningWindow::from_request(warning_days, self.default_warning_days)?;
        let scope = self.scope(unit_id, Some(resource_id))?;

        let expiring = self.fetch_qualifying(&scope, window).await?;
        let mut response = NotifyResponse::new(expiring.len());

        if expiring.is_empty() {
            tracing::info!(resource_id = %resource_id, "No expiring auths for resource");
        } else {
            response.summary.users_notified = 1;
            match self.deliver(resource_id, &expiring).await {
                Ok(_) => {
                    response.record_sent(expiring.len());
                    NotificationMetrics::record_sent();
                }
                Err(failure) => {
                    response.record_failed(failure.message);
                    NotificationMetrics::record_failed();
                }
            }
        }

        NotificationMetrics::observe_duration("notify_resource", started.elapsed().as_secs_f64());
        Ok(response)
    }

    /// Fetch and filter only; nothing is sent or recorded.
    #[tracing::instrument(name = "workflow.list_expiring", skip(self))]
    pub async fn list_expiring(
        &self,
        unit_id: Option<&str>,
        warning_days: Option<i64>,
    ) -> Result<ExpiringListResponse> {
        let started = Instant::now();
        let window = WarningWindow::from_request(warning_days, self.default_warning_days)?;
        let scope = self.scope(unit_id, None)?;

        let mut auths = self.fetch_qualifying(&scope, window).await?;
        auths.sort_by(|a, b| {
            a.expiry_date()
                .cmp(&b.expiry_date())
                .then_with(|| a.resource_id.cmp(&b.resource_id))
        });

        NotificationMetrics::observe_duration("list_expiring", started.elapsed().as_secs_f64());
        Ok(ExpiringListResponse {
            unit_id: scope.unit_id().to_string(),
            expiry_date: window.horizon(self.today()),
            warning_days: window.days(),
            count: auths.len(),
            auths,
        })
    }

    /// Send a sample notice to `email`; touches neither the registry nor the store.
    #[tracing::instrument(name = "workflow.send_test_email", skip(self))]
    pub async fn send_test_email(&self, email: &str, resource_id: &str) -> Result<TestEmailResponse> {
        let email = email.trim();
        let resource_id = resource_id.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("email must be a valid address".to_string()));
        }
        if resource_id.is_empty() {
            return Err(AppError::Validation("resource_id must not be empty".to_string()));
        }

        let notice = ExpiryNotice::from_records(resource_id, &[self.sample_record(resource_id)])
            .with_subject(TEST_EMAIL_SUBJECT);
        self.notifier.send(email, &notice).await?;

        Ok(TestEmailResponse {
            success: true,
            email: email.to_string(),
            resource_id: resource_id.to_string(),
            message: "Test email sent".to_string(),
        })
    }

    fn sample_record(&self, resource_id: &str) -> AuthorisationRecord {
        let today = self.today();
        AuthorisationRecord {
            id: TEST_EMAIL_AUTH_ID,
            map_id: TEST_EMAIL_MAP_ID,
            map_name: "TEST01 Test Authorisation".to_string(),
            state: None,
            currency_state: None,
            map_level: None,
            resource_id: resource_id.to_string(),
            resource_name: "Test User".to_string(),
            resource_rank: None,
            org_unit_id: self.default_unit.trim().parse().unwrap_or_default(),
            org_unit: None,
            completed: None,
            expiry: today.checked_add_days(Days::new(TEST_EMAIL_DAYS_AHEAD)),
        }
    }
}

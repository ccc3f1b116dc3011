//! Request and response bodies for the expiry workflow.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::registry::AuthorisationRecord;

/// Body of `POST /auths/notify-auth-expiry`; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyRequest {
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub warning_days: Option<i64>,
}

/// Body of `POST /auths/notify-auth-expiry/user`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserNotifyRequest {
    pub resource_id: String,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub warning_days: Option<i64>,
}

/// Query string of `GET /auths/expiring`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpiringQuery {
    pub unit_id: Option<String>,
    pub warning_days: Option<i64>,
}

/// Body of `POST /auths/test-email`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestEmailRequest {
    pub email: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifySummary {
    /// Qualifying records after the expiry filter
    pub total_expiring_auths: usize,
    /// People with at least one qualifying record that was not a duplicate
    pub users_notified: usize,
    pub emails_sent: usize,
    /// Records included in emails the provider accepted
    pub records_notified: usize,
}

/// Outcome of a notify run.
///
/// `sent` and `failed` count emails (one per person); `skipped_duplicate`
/// counts records already claimed by an earlier or concurrent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    pub sent: usize,
    pub failed: usize,
    pub skipped_duplicate: usize,
    pub summary: NotifySummary,
    pub errors: Vec<String>,
}

impl NotifyResponse {
    pub(crate) fn new(total_expiring_auths: usize) -> Self {
        Self {
            success: true,
            summary: NotifySummary {
                total_expiring_auths,
                ..NotifySummary::default()
            },
            ..Self::default()
        }
    }

    pub(crate) fn record_sent(&mut self, records: usize) {
        self.sent += 1;
        self.summary.emails_sent += 1;
        self.summary.records_notified += records;
    }

    pub(crate) fn record_failed(&mut self, message: String) {
        self.failed += 1;
        self.success = false;
        self.errors.push(message);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpiringListResponse {
    pub unit_id: String,
    /// Last date inside the warning window
    pub expiry_date: NaiveDate,
    pub warning_days: u32,
    pub count: usize,
    pub auths: Vec<AuthorisationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestEmailResponse {
    pub success: bool,
    pub email: String,
    pub resource_id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_request_accepts_empty_object() {
        let req: NotifyRequest = serde_json::from_str("{}").unwrap();
        assert!(req.unit_id.is_none());
        assert!(req.warning_days.is_none());
    }

    #[test]
    fn test_notify_request_rejects_non_integer_days() {
        assert!(serde_json::from_str::<NotifyRequest>(r#"{"warning_days": "abc"}"#).is_err());
        assert!(serde_json::from_str::<NotifyRequest>(r#"{"warning_days": 1.5}"#).is_err());
    }

    #[test]
    fn test_response_tallies() {
        let mut response = NotifyResponse::new(3);
        response.record_sent(2);
        response.record_failed("R:2: mailbox unavailable".to_string());

        assert_eq!(response.sent, 1);
        assert_eq!(response.failed, 1);
        assert!(!response.success);
        assert_eq!(response.summary.records_notified, 2);
        assert_eq!(response.summary.total_expiring_auths, 3);
    }
}

//! Expiry evaluation.
//!
//! A record qualifies when `0 <= expiry - today <= warning_days`. Records that
//! have already expired are never reported, and records without an expiry
//! date are ignored.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use thiserror::Error;

use crate::registry::AuthorisationRecord;

/// Largest accepted warning window, roughly ten years.
pub const MAX_WARNING_DAYS: i64 = 3650;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("warning_days must not be negative (got {0})")]
    Negative(i64),

    #[error("warning_days must be at most {max} (got {0})", max = MAX_WARNING_DAYS)]
    TooLarge(i64),
}

/// Validated number of days ahead of expiry at which warnings start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningWindow {
    days: u32,
}

impl WarningWindow {
    pub fn new(days: i64) -> Result<Self, WindowError> {
        if days < 0 {
            return Err(WindowError::Negative(days));
        }
        if days > MAX_WARNING_DAYS {
            return Err(WindowError::TooLarge(days));
        }
        Ok(Self { days: days as u32 })
    }

    /// Use the request value when present, otherwise the configured default.
    pub fn from_request(requested: Option<i64>, default_days: u32) -> Result<Self, WindowError> {
        Self::new(requested.unwrap_or(i64::from(default_days)))
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// Last date (inclusive) that falls inside the window.
    pub fn horizon(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.days)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, today: NaiveDate, expiry: NaiveDate) -> bool {
        let remaining = (expiry - today).num_days();
        (0..=i64::from(self.days)).contains(&remaining)
    }
}

/// Keep only records expiring within the window, in input order.
pub fn filter_expiring(
    records: Vec<AuthorisationRecord>,
    window: WarningWindow,
    today: NaiveDate,
) -> Vec<AuthorisationRecord> {
    records
        .into_iter()
        .filter(|record| {
            record
                .expiry_date()
                .is_some_and(|expiry| window.contains(today, expiry))
        })
        .collect()
}

/// Group records by person, each group sorted by expiry date.
///
/// Groups are ordered by resource id so batch runs are deterministic.
pub fn group_by_resource(
    records: Vec<AuthorisationRecord>,
) -> BTreeMap<String, Vec<AuthorisationRecord>> {
    let mut groups: BTreeMap<String, Vec<AuthorisationRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.resource_id.clone())
            .or_default()
            .push(record);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|r| r.expiry_date());
    }
    groups
}

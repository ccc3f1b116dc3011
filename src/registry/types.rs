//! Record types returned by the STARS registry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Engineering authorisation held by a person.
///
/// Immutable snapshot fetched per request; never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorisationRecord {
    /// Registry identifier of this authorisation instance
    pub id: i64,
    /// Authorisation type (STARS "map") identifier
    pub map_id: i64,
    /// Human-readable authorisation title, e.g. "TEST01 Test Authorisation"
    pub map_name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub currency_state: Option<String>,
    #[serde(default)]
    pub map_level: Option<String>,
    /// Person holding the authorisation, e.g. "R:125129"
    pub resource_id: String,
    pub resource_name: String,
    #[serde(default)]
    pub resource_rank: Option<String>,
    pub org_unit_id: i64,
    #[serde(default)]
    pub org_unit: Option<String>,
    #[serde(default, with = "registry_date")]
    pub completed: Option<NaiveDate>,
    #[serde(default, with = "registry_date")]
    pub expiry: Option<NaiveDate>,
}

impl AuthorisationRecord {
    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry
    }

    pub fn authorisation_type(&self) -> i64 {
        self.map_id
    }

    pub fn belongs_to_unit(&self, unit_id: &str) -> bool {
        self.org_unit_id.to_string() == unit_id.trim()
    }
}

/// Personnel entry; only the fields needed to reach the user account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub org_unit_id: Option<i64>,
}

/// User account attached to a person.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Where an expiry email for a person goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

/// `{"data": [...]}` wrapper used by every registry listing.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Registry dates arrive either as `2024-01-20` or `2024-01-20T00:00:00`.
mod registry_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => {
                let date_part = s.get(..10).unwrap_or(s);
                NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}

//! Records persisted by the document store.
//!
//! Timestamps are kept as ISO-8601 text, the same shape the frontend reads.
//! Session expiry written by older deployments may lack an offset; readers
//! interpret those values as UTC (see [`parse_timestamp`]).

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account role, assigned once at creation from the admin allow-list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Only the exact string `admin` grants the admin role.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        if value == "admin" {
            Self::Admin
        } else {
            Self::User
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    /// Absent for accounts created through the OAuth exchange.
    pub password_hash: Option<String>,
    pub role: Role,
    pub created_at: String,
}

/// Server-side session bound to the `session_token` cookie.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub session_token: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub subscription_id: String,
    pub user_id: String,
    pub plan: String,
    pub status: String,
    pub amount: f64,
    pub started_at: String,
    pub updated_at: String,
}

impl Subscription {
    /// Gate predicate: the status must be exactly `active`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BaselineAction {
    pub action_id: String,
    pub base_category: String,
    pub action_text: String,
    pub movement_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_it_helps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<String>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TriggerCard {
    pub trigger_id: String,
    pub trigger_type: String,
    pub title: String,
    pub immediate_action: String,
    pub explanation: String,
    pub body_truth: String,
    pub verse: String,
    pub verse_ref: String,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Verse {
    pub verse_id: String,
    pub verse_text: String,
    pub verse_ref: String,
    pub category: String,
    pub created_at: String,
}

/// One row per user per UTC calendar day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckIn {
    pub check_in_id: String,
    pub user_id: String,
    pub date: String,
    pub signal: String,
    pub base_category: String,
    pub action_id: String,
    pub verse_id: String,
    /// JSON of a generated recommendation when one replaced stored content.
    #[serde(default)]
    pub generated: Option<String>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_id: String,
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub amount: f64,
    pub currency: String,
    pub plan: String,
    pub payment_status: String,
    pub status: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Format a timestamp the way every record stores it.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[must_use]
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a stored timestamp; values without an offset are taken as UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(aware) = DateTime::parse_from_rfc3339(value) {
        return Some(aware.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Short random identifier with a readable prefix, e.g. `user_3f9a0c1b2d4e`.
#[must_use]
pub fn prefixed_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn role_from_stored_is_exact() {
        assert_eq!(Role::from_stored("admin"), Role::Admin);
        assert_eq!(Role::from_stored("Admin"), Role::User);
        assert_eq!(Role::from_stored("user"), Role::User);
        assert_eq!(Role::from_stored(""), Role::User);
    }

    #[test]
    fn subscription_active_requires_literal_status() {
        let mut subscription = Subscription {
            subscription_id: "sub_1".to_string(),
            user_id: "user_1".to_string(),
            plan: "beta_monthly".to_string(),
            status: "active".to_string(),
            amount: 9.0,
            started_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        assert!(subscription.is_active());
        for status in ["Active", "active ", "canceled", "past_due", ""] {
            subscription.status = status.to_string();
            assert!(!subscription.is_active(), "{status:?} must not be active");
        }
    }

    #[test]
    fn parse_timestamp_accepts_offset_and_naive() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).single();
        assert_eq!(parse_timestamp("2024-05-01T12:30:00+00:00"), expected);
        assert_eq!(parse_timestamp("2024-05-01T14:30:00+02:00"), expected);
        assert_eq!(parse_timestamp("2024-05-01T12:30:00"), expected);
        assert_eq!(parse_timestamp("2024-05-01 12:30:00.000"), expected);
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn format_timestamp_round_trips_through_parse() {
        let at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).single();
        let parsed = at.map(format_timestamp).as_deref().and_then(parse_timestamp);
        assert_eq!(parsed, at);
    }

    #[test]
    fn prefixed_id_shape() {
        let id = prefixed_id("user");
        assert!(id.starts_with("user_"));
        assert_eq!(id.len(), "user_".len() + 12);
        assert!(id["user_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}

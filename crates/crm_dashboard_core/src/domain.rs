//! crates/crm_dashboard_core/src/domain.rs
//!
//! Defines the pure, core data structures for the dashboard.
//! These structs are independent of any database or transport format; the
//! serde derives exist so values can be stored in key-value backends and
//! echoed back to clients unchanged.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Users and Authentication
//=========================================================================================

// Represents a staff member - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
}

impl UserCredentials {
    pub fn to_user(&self) -> User {
        User {
            user_id: self.user_id,
            email: self.email.clone(),
        }
    }
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated user on whose behalf an operation runs.
///
/// Resolved once from the session cookie and passed explicitly to every
/// mutating operation, so repositories never guess who the caller is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Uuid,
}

/// Lowercases and trims an email so lookups and rate-limit keys agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

//=========================================================================================
// Rate Limiting
//=========================================================================================

/// The persisted state of one rate-limited identifier (an email or an IP).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub attempts: u32,
    pub last_attempt_at: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

/// The outcome of checking and recording one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RateDecision {
    Allowed { remaining_attempts: u32 },
    Blocked { blocked_until: DateTime<Utc> },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

//=========================================================================================
// Contracts and Visits
//=========================================================================================

/// The pipeline status of a contract line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    Waiting,
    InProgress,
    Negotiating,
    Done,
    Cancelled,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Waiting => "WAITING",
            ContractStatus::InProgress => "IN_PROGRESS",
            ContractStatus::Negotiating => "NEGOTIATING",
            ContractStatus::Done => "DONE",
            ContractStatus::Cancelled => "CANCELLED",
        }
    }

    /// `DONE` is the only terminal status; it requires a signing month.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Done)
    }
}

/// Whether the visit attached to an update actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    Visited,
    NotVisited,
    Rescheduled,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Visited => "VISITED",
            VisitStatus::NotVisited => "NOT_VISITED",
            VisitStatus::Rescheduled => "RESCHEDULED",
        }
    }
}

/// Customer segment used by the quadrant chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quadrant {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quadrant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::Q1 => "Q1",
            Quadrant::Q2 => "Q2",
            Quadrant::Q3 => "Q3",
            Quadrant::Q4 => "Q4",
        }
    }
}

/// Error returned when a stored or submitted enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for ContractStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(ContractStatus::Waiting),
            "IN_PROGRESS" => Ok(ContractStatus::InProgress),
            "NEGOTIATING" => Ok(ContractStatus::Negotiating),
            "DONE" => Ok(ContractStatus::Done),
            "CANCELLED" => Ok(ContractStatus::Cancelled),
            other => Err(ParseLabelError {
                kind: "contract status",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for VisitStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VISITED" => Ok(VisitStatus::Visited),
            "NOT_VISITED" => Ok(VisitStatus::NotVisited),
            "RESCHEDULED" => Ok(VisitStatus::Rescheduled),
            other => Err(ParseLabelError {
                kind: "visit status",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Quadrant {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Q1" => Ok(Quadrant::Q1),
            "Q2" => Ok(Quadrant::Q2),
            "Q3" => Ok(Quadrant::Q3),
            "Q4" => Ok(Quadrant::Q4),
            other => Err(ParseLabelError {
                kind: "quadrant",
                value: other.to_string(),
            }),
        }
    }
}

/// The month a contract was signed, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SigningMonth {
    year: i32,
    month: u32,
}

impl SigningMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for SigningMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for SigningMonth {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseLabelError {
            kind: "signing month",
            value: s.to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let all_digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !all_digits(year, 4) || !all_digits(month, 2) {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        SigningMonth::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for SigningMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SigningMonth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Trimming and loss derived from a contract price and a renegotiated price.
/// At most one of the two is ever positive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reconciliation {
    pub trimming: f64,
    pub loss: f64,
}

/// A single contract line item under a client company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractLineItem {
    pub id: Uuid,
    pub company_id: Uuid,
    pub product_name: String,
    pub certification_code: Option<String>,
    pub quadrant: Option<Quadrant>,
    pub contract_price: f64,
    pub updated_price: Option<f64>,
    pub trimming_value: f64,
    pub loss_value: f64,
    pub status: Option<ContractStatus>,
    pub visit_date: Option<NaiveDate>,
    pub visit_status: Option<VisitStatus>,
    pub note: Option<String>,
    pub photo_ref: Option<String>,
    pub signing_month: Option<SigningMonth>,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_month_parses_and_displays() {
        let month: SigningMonth = "2026-07".parse().unwrap();
        assert_eq!((month.year(), month.month()), (2026, 7));
        assert_eq!(month.to_string(), "2026-07");
        assert!("2026-13".parse::<SigningMonth>().is_err());
        assert!("July".parse::<SigningMonth>().is_err());
    }

    #[test]
    fn signing_month_requires_four_digit_year_and_two_digit_month() {
        for raw in ["+2026-07", "2026-007", "2026-7", "-2026-07", "02026-07", "2026-+7"] {
            assert!(raw.parse::<SigningMonth>().is_err(), "{raw}");
        }
        assert!(" 2026-07 ".parse::<SigningMonth>().is_ok());
    }

    #[test]
    fn status_labels_match_wire_names() {
        for status in [
            ContractStatus::Waiting,
            ContractStatus::InProgress,
            ContractStatus::Negotiating,
            ContractStatus::Done,
            ContractStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<ContractStatus>(), Ok(status));
        }
    }

    #[test]
    fn rate_decision_serializes_with_status_tag() {
        let json = serde_json::to_value(RateDecision::Allowed {
            remaining_attempts: 3,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "allowed", "remaining_attempts": 3 })
        );
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }
}

//! Session models and status lifecycle.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::subtable::SessionTables;

/// Review status of a session.
///
/// Sessions created by the practitioner start `Approved`; intake submissions
/// start `Pending`. The only transition is `Pending -> Approved`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Submitted by the client, awaiting practitioner review
    Pending,
    /// Created or approved by the practitioner
    Approved,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Approved => "approved",
        }
    }

    /// Read a stored status.
    ///
    /// Legacy rows written before the status column existed carry no value;
    /// those read as `Approved`. Unknown values yield `None`.
    pub fn from_stored(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim) {
            None | Some("") => Some(SessionStatus::Approved),
            Some("approved") => Some(SessionStatus::Approved),
            Some("pending") => Some(SessionStatus::Pending),
            Some(_) => None,
        }
    }

    /// Status after an approve action. Approval is one-way and idempotent.
    pub fn approve(self) -> Self {
        SessionStatus::Approved
    }

    pub fn is_pending(self) -> bool {
        self == SessionStatus::Pending
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Pending => "Pending",
            SessionStatus::Approved => "Approved",
        }
    }
}

/// A session record belonging to exactly one client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Owning client ID
    pub client_id: String,
    pub status: SessionStatus,
    #[serde(flatten)]
    pub fields: SessionFields,
    pub created_at: String,
    pub updated_at: String,
}

/// Form-editable content of a session.
///
/// Status is not a form field; only the session workflow sets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionFields {
    /// Appointment date (YYYY-MM-DD)
    pub date: Option<String>,
    pub practitioner: Option<String>,
    #[serde(flatten)]
    pub tables: SessionTables,
    /// What aggravates the pain
    pub aggravates: Option<String>,
    pub swelling: Option<String>,
    pub injury_site: Option<String>,
    /// Pacemaker, implants, orthotics
    pub implants: Option<String>,
    pub exercise: Option<String>,
    /// Prior treatment history
    pub bowen_history: Option<String>,
    pub additional: Option<String>,
    /// Therapist notes
    pub notes: Option<String>,
    /// Client signature as an image data URI
    pub client_signature: Option<String>,
    /// Therapist signature as an image data URI
    pub therapist_signature: Option<String>,
}

impl SessionFields {
    /// Blank optional strings are stored as absent.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.date,
            &mut self.practitioner,
            &mut self.aggravates,
            &mut self.swelling,
            &mut self.injury_site,
            &mut self.implants,
            &mut self.exercise,
            &mut self.bowen_history,
            &mut self.additional,
            &mut self.notes,
            &mut self.client_signature,
            &mut self.therapist_signature,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }
}

impl Session {
    /// Sort key: appointment date, falling back to creation time.
    pub fn sort_key(&self) -> Option<NaiveDateTime> {
        self.fields
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .or_else(|| {
                DateTime::parse_from_rfc3339(&self.created_at)
                    .ok()
                    .map(|dt| dt.naive_utc())
            })
    }

    /// Non-empty complaint names, in order.
    pub fn complaint_names(&self) -> Vec<&str> {
        self.fields
            .tables
            .complaints
            .iter()
            .map(|c| c.complaint.as_str())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Sessions of one client, split by review status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPartition {
    /// Client submissions awaiting review, newest first
    pub pending: Vec<Session>,
    /// Approved and legacy sessions, newest first
    pub approved: Vec<Session>,
}

impl SessionPartition {
    /// Split and sort sessions (date descending, creation time as fallback).
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        let (mut pending, mut approved): (Vec<_>, Vec<_>) =
            sessions.into_iter().partition(|s| s.status.is_pending());
        pending.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        approved.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        Self { pending, approved }
    }

    pub fn total(&self) -> usize {
        self.pending.len() + self.approved.len()
    }
}

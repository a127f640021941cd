//! Public intake gate.
//!
//! A link carrying a client token opens a form-only page for that client.
//! The gate is one-way:
//!
//! ```text
//!   Normal ──token resolves──▶ IntakeActive ──submit ok──▶ IntakeSubmitted
//!     │                          │    ▲
//!     │                          └────┘ submit failed (retry)
//!     └──token unresolved──▶ Halted
//! ```
//!
//! Outside `Normal` no practitioner view is reachable.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{Session, SessionFields, SubTableKind, TableGrid};
use crate::store::RecordStore;
use crate::workflow::{SessionError, SessionWorkflow};

pub const INVALID_LINK_TITLE: &str = "Invalid Link";
pub const INVALID_LINK_MESSAGE: &str = "This intake form link is not valid or has expired. \
     Please contact your therapist for a new link.";
pub const SUBMITTED_TITLE: &str = "Thank You!";
pub const SUBMITTED_MESSAGE: &str = "Your intake form has been submitted. \
     Your therapist will review it before your appointment.";
pub const RETRY_MESSAGE: &str = "Failed to submit intake form. Please try again. \
     If the problem persists, please contact your therapist.";

/// Intake gate errors.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Intake form is not active")]
    NotActive,

    #[error("Submission already in progress")]
    SubmitInProgress,

    #[error("Invalid intake submission: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(
        "Failed to submit intake form. Please try again. \
         If the problem persists, please contact your therapist."
    )]
    SubmitFailed(#[source] SessionError),
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// Page mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GateState {
    /// Practitioner app
    #[default]
    Normal,
    /// Form-only page for one client
    IntakeActive(IntakeForm),
    /// Success message, permanently
    IntakeSubmitted,
    /// Invalid link message; nothing else is usable
    Halted,
}

impl GateState {
    pub fn is_normal(&self) -> bool {
        matches!(self, GateState::Normal)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GateState::Normal => "normal",
            GateState::IntakeActive(_) => "intake_active",
            GateState::IntakeSubmitted => "intake_submitted",
            GateState::Halted => "halted",
        }
    }

    pub fn form(&self) -> Option<&IntakeForm> {
        match self {
            GateState::IntakeActive(form) => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut IntakeForm> {
        match self {
            GateState::IntakeActive(form) => Some(form),
            _ => None,
        }
    }
}

/// Advisory guard against double submission.
///
/// Disabled while a submit is in flight, re-enabled only on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitControl {
    enabled: bool,
}

impl Default for SubmitControl {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl SubmitControl {
    /// Disable the control. Returns false if it was already disabled.
    pub fn begin(&mut self) -> bool {
        std::mem::replace(&mut self.enabled, false)
    }

    /// Re-enable after a failed submit.
    pub fn fail(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn label(&self) -> &'static str {
        if self.enabled {
            "Submit"
        } else {
            "Submitting..."
        }
    }
}

/// The intake form for one client.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeForm {
    pub client_id: String,
    pub client_name: String,
    /// Earliest selectable appointment date
    pub min_date: NaiveDate,
    /// Free-text answers and the appointment date
    pub fields: SessionFields,
    grids: Vec<TableGrid>,
    pub submit: SubmitControl,
}

impl IntakeForm {
    /// A fresh form: date set to today, one blank row per sub-table.
    pub fn new(client_id: impl Into<String>, client_name: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            client_id: client_id.into(),
            client_name: client_name.into(),
            min_date: today,
            fields: SessionFields {
                date: Some(today.format("%Y-%m-%d").to_string()),
                ..Default::default()
            },
            grids: SubTableKind::ALL.iter().map(|&k| TableGrid::blank(k)).collect(),
            submit: SubmitControl::default(),
        }
    }

    /// Default for the appointment date input.
    pub fn default_date(&self) -> String {
        self.min_date.format("%Y-%m-%d").to_string()
    }

    pub fn grids(&self) -> &[TableGrid] {
        &self.grids
    }

    pub fn grid(&self, kind: SubTableKind) -> Option<&TableGrid> {
        self.grids.iter().find(|g| g.kind() == kind)
    }

    pub fn grid_mut(&mut self, kind: SubTableKind) -> Option<&mut TableGrid> {
        self.grids.iter_mut().find(|g| g.kind() == kind)
    }

    /// Answers as session fields. Practitioner-only fields are never taken
    /// from the intake form.
    pub fn collect(&self) -> SessionFields {
        let mut fields = self.fields.clone();
        for grid in &self.grids {
            fields.tables.set_from_grid(grid.kind(), grid.rows());
        }
        strip_practitioner_fields(fields)
    }
}

fn strip_practitioner_fields(mut fields: SessionFields) -> SessionFields {
    fields.practitioner = None;
    fields.notes = None;
    fields.client_signature = None;
    fields.therapist_signature = None;
    fields
}

/// Read the intake token from a page location.
///
/// The query string is checked first, then the fragment (`#client=...` or
/// `#?client=...`). Empty values do not count.
pub fn intake_token(location: &str, param: &str) -> Option<String> {
    let (before_fragment, fragment) = match location.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (location, None),
    };
    let query = before_fragment.split_once('?').map(|(_, q)| q);

    query
        .and_then(|q| query_value(q, param))
        .or_else(|| {
            fragment
                .map(|f| f.trim_start_matches('?'))
                .and_then(|f| query_value(f, param))
        })
}

fn query_value(query: &str, param: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| percent_decode(key) == param)
        .map(|(_, value)| percent_decode(value))
        .filter(|value| !value.trim().is_empty())
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                        continue;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Resolve a token to a client and open the gate.
///
/// An unknown client or a failing store halts the page.
pub fn enter<S: RecordStore + ?Sized>(store: &S, token: &str, today: NaiveDate) -> GateState {
    match store.get_client(token) {
        Ok(Some(client)) => {
            info!(client_id = %client.id, "Intake form opened");
            GateState::IntakeActive(IntakeForm::new(client.id, client.name, today))
        }
        Ok(None) => {
            warn!(token, "Intake link does not match a client");
            GateState::Halted
        }
        Err(e) => {
            warn!(token, error = %e, "Failed to resolve intake link");
            GateState::Halted
        }
    }
}

/// Submit the active form as a pending session.
///
/// On success the gate locks to `IntakeSubmitted`. On failure it stays
/// active with the submit control re-enabled.
pub fn submit<S: RecordStore + ?Sized>(state: &mut GateState, store: &S) -> IntakeResult<Session> {
    let form = state.form_mut().ok_or(IntakeError::NotActive)?;
    if !form.submit.begin() {
        return Err(IntakeError::SubmitInProgress);
    }

    let result = SessionWorkflow::new(store).create_pending(&form.client_id, form.collect());
    match result {
        Ok(session) => {
            info!(session_id = %session.id, client_id = %session.client_id, "Intake submitted");
            *state = GateState::IntakeSubmitted;
            Ok(session)
        }
        Err(e) => {
            warn!(error = %e, "Intake submission failed");
            form.submit.fail();
            Err(IntakeError::SubmitFailed(e))
        }
    }
}

/// Replace the form answers from a JSON payload, then submit.
///
/// Unknown keys, including any `status`, are ignored.
pub fn submit_json<S: RecordStore + ?Sized>(
    state: &mut GateState,
    store: &S,
    payload: &str,
) -> IntakeResult<Session> {
    let form = state.form_mut().ok_or(IntakeError::NotActive)?;
    let fields: SessionFields = serde_json::from_str(payload)?;
    for kind in SubTableKind::ALL {
        if let Some(grid) = form.grid_mut(kind) {
            *grid = TableGrid::from_cells(kind, fields.tables.cells(kind));
        }
    }
    form.fields = SessionFields {
        tables: Default::default(),
        ..fields
    };
    submit(state, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ClientFields, SessionStatus};
    use crate::store::testing::FlakyStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_token_from_query() {
        assert_eq!(
            intake_token("https://example.com/app/?client=abc-123", "client"),
            Some("abc-123".into())
        );
        assert_eq!(
            intake_token("https://example.com/?x=1&client=abc#ignored", "client"),
            Some("abc".into())
        );
        assert_eq!(intake_token("https://example.com/", "client"), None);
        assert_eq!(intake_token("https://example.com/?client=", "client"), None);
        assert_eq!(intake_token("https://example.com/?clientele=abc", "client"), None);
    }

    #[test]
    fn test_token_from_fragment() {
        assert_eq!(
            intake_token("https://example.com/#client=abc", "client"),
            Some("abc".into())
        );
        assert_eq!(
            intake_token("https://example.com/#?client=abc", "client"),
            Some("abc".into())
        );
        // Query wins over fragment.
        assert_eq!(
            intake_token("https://example.com/?client=q#client=f", "client"),
            Some("q".into())
        );
    }

    #[test]
    fn test_token_is_percent_decoded() {
        assert_eq!(
            intake_token("https://example.com/?client=a%2Db+c", "client"),
            Some("a-b c".into())
        );
        assert_eq!(
            intake_token("https://example.com/?client=100%", "client"),
            Some("100%".into())
        );
    }

    #[test]
    fn test_enter_prefills_today() {
        let db = Database::open_in_memory().unwrap();
        let jane = db.insert_client(&ClientFields::named("Jane Doe")).unwrap();

        let state = enter(&db, &jane.id, today());
        let form = state.form().unwrap();
        assert_eq!(form.client_name, "Jane Doe");
        assert_eq!(form.min_date, today());
        assert_eq!(form.default_date(), "2024-06-01");
        assert_eq!(form.fields.date.as_deref(), Some("2024-06-01"));
        assert_eq!(form.grids().len(), 6);
        assert!(form.grids().iter().all(|g| g.rows().len() == 1 && g.is_blank()));
    }

    #[test]
    fn test_unknown_token_halts() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(enter(&db, "nobody", today()), GateState::Halted);

        let store = FlakyStore::new();
        store.fail_all.set(true);
        assert_eq!(enter(&store, "anyone", today()), GateState::Halted);
    }

    #[test]
    fn test_submit_locks_gate() {
        let db = Database::open_in_memory().unwrap();
        let jane = db.insert_client(&ClientFields::named("Jane Doe")).unwrap();
        let mut state = enter(&db, &jane.id, today());

        let form = state.form_mut().unwrap();
        form.grid_mut(SubTableKind::Complaints)
            .unwrap()
            .set_cell(0, 0, "headache");
        form.fields.notes = Some("I am the therapist now".into());

        let session = submit(&mut state, &db).unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.complaint_names(), vec!["headache"]);
        assert_eq!(session.fields.notes, None);
        assert_eq!(state, GateState::IntakeSubmitted);

        assert!(matches!(submit(&mut state, &db), Err(IntakeError::NotActive)));
    }

    #[test]
    fn test_failed_submit_allows_retry() {
        let store = FlakyStore::new();
        let jane = RecordStore::insert_client(&store, &ClientFields::named("Jane Doe")).unwrap();
        let mut state = enter(&store, &jane.id, today());

        store.fail_inserts.set(true);
        let err = submit(&mut state, &store).unwrap_err();
        assert_eq!(err.to_string(), RETRY_MESSAGE);
        let form = state.form().unwrap();
        assert!(form.submit.is_enabled());
        assert!(store.inner.list_sessions_for_client(&jane.id).unwrap().is_empty());

        store.fail_inserts.set(false);
        submit(&mut state, &store).unwrap();
        assert_eq!(state, GateState::IntakeSubmitted);
    }

    #[test]
    fn test_submit_control_blocks_double_submit() {
        let mut control = SubmitControl::default();
        assert!(control.begin());
        assert_eq!(control.label(), "Submitting...");
        assert!(!control.begin());
        control.fail();
        assert!(control.is_enabled());
    }

    #[test]
    fn test_injected_status_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let jane = db.insert_client(&ClientFields::named("Jane Doe")).unwrap();
        let mut state = enter(&db, &jane.id, today());

        let payload = r#"{
            "date": "2024-06-03",
            "status": "approved",
            "complaints": [{"complaint": "", "since": "x"}, {"complaint": "neck"}],
            "therapistSignature": "data:image/png;base64,forged"
        }"#;
        let session = submit_json(&mut state, &db, payload).unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.fields.date.as_deref(), Some("2024-06-03"));
        assert_eq!(session.complaint_names(), vec!["neck"]);
        assert_eq!(session.fields.therapist_signature, None);
    }
}

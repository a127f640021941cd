//! Practice Intake Core Library
//!
//! Client records for a solo therapy practice, with a public intake form
//! clients fill out before their appointment.
//!
//! # Architecture
//!
//! ```text
//!                 page load
//!                     │
//!          validate configuration ──fails──▶ Configuration Error page
//!                     │
//!             intake token in URL?
//!              │               │
//!             yes              no
//!              ▼               ▼
//!        Intake Gate      Practitioner app
//!     (form-only, one-way)  Directory ⇄ Client ⇄ Sessions
//!              │               │
//!              └──── Record Store (clients, sessions) ────┘
//! ```
//!
//! Intake submissions land as **pending** sessions; the practitioner
//! approves or rejects them from the client page.
//!
//! # Modules
//!
//! - [`db`]: SQLite record store
//! - [`models`]: Domain types (Client, Session, sub-table rows)
//! - [`store`]: The `RecordStore` boundary
//! - [`directory`]: Client listing, debounced search and client CRUD
//! - [`workflow`]: Session CRUD and the pending/approved review flow
//! - [`intake`]: Public intake gate
//! - [`view`]: Current view and tab visibility
//! - [`present`]: View models for every screen
//! - [`app`]: Page controller wiring it all together

pub mod app;
pub mod config;
pub mod db;
pub mod debounce;
pub mod directory;
pub mod interact;
pub mod intake;
pub mod models;
pub mod present;
pub mod signature;
pub mod store;
pub mod view;
pub mod workflow;

// Re-export commonly used types
pub use app::{AppState, ClientForm, Outcome, Practice, Screen};
pub use config::PracticeConfig;
pub use db::Database;
pub use directory::{ClientDirectory, SessionCount};
pub use intake::GateState;
pub use models::{
    Client, ClientFields, Session, SessionFields, SessionPartition, SessionStatus, SubTableKind,
};
pub use store::{RecordStore, StoreError};
pub use view::View;
pub use workflow::{SessionForm, SessionWorkflow};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;

use present::{ClientCard, Notice, NoticeLevel};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PracticeIntakeError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for PracticeIntakeError {
    fn from(e: db::DbError) -> Self {
        PracticeIntakeError::DatabaseError(e.to_string())
    }
}

impl From<StoreError> for PracticeIntakeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => PracticeIntakeError::NotFound(what),
            other => PracticeIntakeError::DatabaseError(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for PracticeIntakeError {
    fn from(e: config::ConfigError) -> Self {
        PracticeIntakeError::ConfigurationError(e.to_string())
    }
}

impl From<directory::DirectoryError> for PracticeIntakeError {
    fn from(e: directory::DirectoryError) -> Self {
        match e {
            directory::DirectoryError::Store(e) => e.into(),
            directory::DirectoryError::NotFound(id) => PracticeIntakeError::NotFound(id),
            other => PracticeIntakeError::InvalidInput(other.to_string()),
        }
    }
}

impl From<workflow::SessionError> for PracticeIntakeError {
    fn from(e: workflow::SessionError) -> Self {
        match e {
            workflow::SessionError::Store(e) => e.into(),
            workflow::SessionError::NotFound(id) | workflow::SessionError::ClientNotFound(id) => {
                PracticeIntakeError::NotFound(id)
            }
            other => PracticeIntakeError::InvalidInput(other.to_string()),
        }
    }
}

impl From<intake::IntakeError> for PracticeIntakeError {
    fn from(e: intake::IntakeError) -> Self {
        PracticeIntakeError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for PracticeIntakeError {
    fn from(e: serde_json::Error) -> Self {
        PracticeIntakeError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PracticeIntakeError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PracticeIntakeError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the practice described by a JSON configuration document.
#[uniffi::export]
pub fn open_practice(config_json: String) -> Result<Arc<PracticeCore>, PracticeIntakeError> {
    let config = PracticeConfig::from_json_str(&config_json)?;
    let db = Database::open(&config.database_path)?;
    Ok(PracticeCore::wrap(db, config))
}

/// Open a practice backed by an in-memory database (for testing).
#[uniffi::export]
pub fn open_practice_in_memory(public_url: String) -> Result<Arc<PracticeCore>, PracticeIntakeError> {
    let config = PracticeConfig::new(":memory:", public_url);
    config.validate()?;
    let db = Database::open_in_memory()?;
    Ok(PracticeCore::wrap(db, config))
}

/// The static page for an unusable configuration, or `None` when the
/// configuration is fine.
#[uniffi::export]
pub fn configuration_error_screen(config_json: String) -> Option<FfiScreen> {
    PracticeConfig::from_json_str(&config_json)
        .err()
        .map(|e| Screen::configuration_error(&e).into())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe page controller for FFI.
///
/// Locks are always taken practice first, then state.
#[derive(uniffi::Object)]
pub struct PracticeCore {
    practice: Mutex<Practice<Database>>,
    state: Mutex<AppState>,
}

impl PracticeCore {
    fn wrap(db: Database, config: PracticeConfig) -> Arc<Self> {
        Arc::new(Self {
            practice: Mutex::new(Practice::new(db, config)),
            state: Mutex::new(AppState::default()),
        })
    }
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn confirmed(answer: bool) -> impl Fn(&str) -> bool {
    move |_| answer
}

#[uniffi::export]
impl PracticeCore {
    // =========================================================================
    // Page
    // =========================================================================

    /// Page load at `location` (the full page URL). Repeat calls never
    /// leave an intake page.
    pub fn boot(&self, location: String) -> Result<Option<FfiNotice>, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        Ok(practice.boot(&mut state, &location, today()).map(Into::into))
    }

    /// What the page shows right now.
    pub fn screen(&self) -> Result<FfiScreen, PracticeIntakeError> {
        Ok(self.state.lock()?.screen().into())
    }

    /// Header tabs currently shown, by view name. Empty outside normal mode.
    pub fn visible_tabs(&self) -> Result<Vec<String>, PracticeIntakeError> {
        let state = self.state.lock()?;
        if !state.views.nav_visible(&state.gate) {
            return Ok(Vec::new());
        }
        let tabs = state.views.tabs();
        Ok(View::ALL
            .into_iter()
            .filter(|v| tabs.is_visible(*v))
            .map(|v| v.name().to_string())
            .collect())
    }

    pub fn switch_to(&self, view: String) -> Result<Option<FfiNotice>, PracticeIntakeError> {
        let view = View::from_name(&view)
            .ok_or_else(|| PracticeIntakeError::InvalidInput(format!("Unknown view: {view}")))?;
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        Ok(practice.switch_to(&mut state, view).map(Into::into))
    }

    // =========================================================================
    // Directory
    // =========================================================================

    pub fn client_cards(&self) -> Result<Vec<FfiClientCard>, PracticeIntakeError> {
        let practice = self.practice.lock()?;
        Ok(practice.client_cards().into_iter().map(Into::into).collect())
    }

    /// Fetch one card's session count and return its new label.
    ///
    /// Cards render with "Loading..." first; call this once per card id.
    /// `None` means the card is no longer listed.
    pub fn load_session_count(
        &self,
        client_id: String,
    ) -> Result<Option<String>, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        Ok(practice.load_session_count(&client_id).map(SessionCount::label))
    }

    /// Search box input. Call `poll_search` after `search_due_in_ms`.
    pub fn search_input(&self, query: String) -> Result<(), PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let state = self.state.lock()?;
        practice.search_input(&state, &query, Instant::now());
        Ok(())
    }

    pub fn poll_search(&self) -> Result<Option<FfiNotice>, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let state = self.state.lock()?;
        Ok(practice.poll_search(&state, Instant::now()).map(Into::into))
    }

    /// Milliseconds until the pending search is due, if one is pending.
    pub fn search_due_in_ms(&self) -> Result<Option<u64>, PracticeIntakeError> {
        let practice = self.practice.lock()?;
        Ok(practice
            .search_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()).as_millis() as u64))
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Client detail page as JSON.
    pub fn view_client(&self, client_id: String) -> Result<FfiOutcome, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.view_client(&mut state, &client_id))
    }

    /// Blank client form as JSON.
    pub fn new_client(&self) -> Result<FfiOutcome, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.new_client(&mut state))
    }

    /// Client form pre-filled with the current client, as JSON.
    pub fn edit_client(&self) -> Result<FfiOutcome, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.edit_client(&mut state))
    }

    /// Save client fields given as JSON; no `client_id` creates.
    pub fn save_client(
        &self,
        client_id: Option<String>,
        fields_json: String,
    ) -> Result<FfiOutcome, PracticeIntakeError> {
        let fields: ClientFields = serde_json::from_str(&fields_json)?;
        let form = ClientForm {
            client_id,
            title: String::new(),
            fields,
        };
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.save_client(&mut state, &form, today()))
    }

    /// Delete the current client; the shell asks for confirmation first.
    pub fn delete_client(&self, confirm: bool) -> Result<FfiOutcome, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.delete_client(&mut state, &confirmed(confirm)))
    }

    pub fn intake_link(&self) -> Result<Option<String>, PracticeIntakeError> {
        let practice = self.practice.lock()?;
        let state = self.state.lock()?;
        Ok(practice.intake_link(&state))
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn new_session(&self) -> Result<Option<FfiSessionForm>, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        practice
            .new_session(&mut state, today())
            .value
            .map(FfiSessionForm::try_from)
            .transpose()
    }

    pub fn edit_session(&self) -> Result<Option<FfiSessionForm>, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        practice
            .edit_session(&mut state)
            .value
            .map(FfiSessionForm::try_from)
            .transpose()
    }

    /// Save session fields given as JSON; no `session_id` creates.
    pub fn save_session(
        &self,
        session_id: Option<String>,
        client_id: String,
        fields_json: String,
    ) -> Result<FfiOutcome, PracticeIntakeError> {
        let fields: SessionFields = serde_json::from_str(&fields_json)?;
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.save_session_fields(
            &mut state,
            session_id.as_deref(),
            &client_id,
            fields,
        ))
    }

    /// Session detail page as JSON.
    pub fn view_session(&self, session_id: String) -> Result<FfiOutcome, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.view_session(&mut state, &session_id))
    }

    pub fn delete_session(&self, confirm: bool) -> Result<FfiOutcome, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.delete_session(&mut state, &confirmed(confirm)))
    }

    pub fn approve_session(&self, session_id: String) -> Result<FfiOutcome, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.approve_session(&mut state, &session_id))
    }

    pub fn reject_session(
        &self,
        session_id: String,
        confirm: bool,
    ) -> Result<FfiOutcome, PracticeIntakeError> {
        let mut practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.reject_session(
            &mut state,
            &session_id,
            &confirmed(confirm),
        ))
    }

    // =========================================================================
    // Intake
    // =========================================================================

    /// The active intake form, if the page is in intake mode.
    pub fn intake_form(&self) -> Result<Option<FfiIntakeForm>, PracticeIntakeError> {
        let state = self.state.lock()?;
        Ok(state.gate.form().map(|form| FfiIntakeForm {
            client_id: form.client_id.clone(),
            client_name: form.client_name.clone(),
            min_date: form.default_date(),
            default_date: form.default_date(),
            submit_label: form.submit.label().to_string(),
            submit_enabled: form.submit.is_enabled(),
        }))
    }

    /// Submit intake answers given as JSON. Any `status` in the payload is
    /// ignored; the session is always pending.
    pub fn submit_intake(&self, answers_json: String) -> Result<FfiOutcome, PracticeIntakeError> {
        let practice = self.practice.lock()?;
        let mut state = self.state.lock()?;
        FfiOutcome::from_outcome(practice.submit_intake_json(&mut state, &answers_json))
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe toast.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNotice {
    /// `info`, `success` or `error`
    pub level: String,
    pub message: String,
}

impl From<Notice> for FfiNotice {
    fn from(notice: Notice) -> Self {
        let level = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Error => "error",
        };
        Self {
            level: level.to_string(),
            message: notice.message,
        }
    }
}

/// FFI-safe handler result. `json` carries the view model, when any.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOutcome {
    pub json: Option<String>,
    pub notice: Option<FfiNotice>,
}

impl FfiOutcome {
    fn from_outcome<T: Serialize>(outcome: Outcome<T>) -> Result<Self, PracticeIntakeError> {
        Ok(Self {
            json: outcome.value.as_ref().map(serde_json::to_string).transpose()?,
            notice: outcome.notice.map(Into::into),
        })
    }
}

/// FFI-safe page content.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiScreen {
    /// `practice`, `intakeForm` or `message`
    pub kind: String,
    pub view: Option<String>,
    pub client_name: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
}

impl From<Screen> for FfiScreen {
    fn from(screen: Screen) -> Self {
        let blank = Self {
            kind: String::new(),
            view: None,
            client_name: None,
            title: None,
            message: None,
        };
        match screen {
            Screen::Practice { view } => Self {
                kind: "practice".to_string(),
                view: Some(view.name().to_string()),
                ..blank
            },
            Screen::IntakeForm { client_name } => Self {
                kind: "intakeForm".to_string(),
                client_name: Some(client_name),
                ..blank
            },
            Screen::Message { title, message } => Self {
                kind: "message".to_string(),
                title: Some(title),
                message: Some(message),
                ..blank
            },
        }
    }
}

/// FFI-safe directory row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClientCard {
    pub id: String,
    pub initials: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<String>,
    pub sessions: String,
}

impl From<ClientCard> for FfiClientCard {
    fn from(card: ClientCard) -> Self {
        Self {
            id: card.id,
            initials: card.initials,
            name: card.name,
            email: card.email,
            phone: card.phone,
            age: card.age,
            sessions: card.sessions,
        }
    }
}

/// FFI-safe session form. `fields_json` holds every field and sub-table.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSessionForm {
    pub session_id: Option<String>,
    pub client_id: String,
    pub title: String,
    pub fields_json: String,
}

impl TryFrom<SessionForm> for FfiSessionForm {
    type Error = PracticeIntakeError;

    fn try_from(form: SessionForm) -> Result<Self, Self::Error> {
        Ok(Self {
            fields_json: serde_json::to_string(&form.collect())?,
            session_id: form.session_id,
            client_id: form.client_id,
            title: form.title,
        })
    }
}

/// FFI-safe intake form header.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIntakeForm {
    pub client_id: String,
    pub client_name: String,
    /// Earliest selectable appointment date
    pub min_date: String,
    pub default_date: String,
    pub submit_label: String,
    pub submit_enabled: bool,
}

//! Page controller.
//!
//! [`Practice`] owns the store, the configuration and the directory state,
//! and runs one handler per user action against an explicit [`AppState`].
//! Handlers never panic on backend failures: they return an [`Outcome`]
//! whose notice the shell shows as a toast.

use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PracticeConfig};
use crate::directory::{ClientDirectory, DirectoryError, DirectoryListing, SessionCount};
use crate::interact::{copy_or_fallback, Clipboard, Confirmer, CopyOutcome};
use crate::intake::{
    self, GateState, IntakeError, INVALID_LINK_MESSAGE, INVALID_LINK_TITLE, RETRY_MESSAGE,
    SUBMITTED_MESSAGE, SUBMITTED_TITLE,
};
use crate::models::{Client, ClientFields, Session, SessionFields};
use crate::present::{client_cards, ClientCard, ClientDetailView, Notice, SessionDetailView};
use crate::store::RecordStore;
use crate::view::{View, ViewChange, ViewController};
use crate::workflow::{SessionError, SessionForm, SessionWorkflow};

pub const CONFIG_ERROR_TITLE: &str = "Configuration Error";

/// Everything the page remembers between handlers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub gate: GateState,
    pub views: ViewController,
    pub current_client_id: Option<String>,
    pub current_session_id: Option<String>,
}

impl AppState {
    /// What the page shows right now.
    pub fn screen(&self) -> Screen {
        match &self.gate {
            GateState::Normal => Screen::Practice {
                view: self.views.current(),
            },
            GateState::IntakeActive(form) => Screen::IntakeForm {
                client_name: form.client_name.clone(),
            },
            GateState::IntakeSubmitted => Screen::Message {
                title: SUBMITTED_TITLE.to_string(),
                message: SUBMITTED_MESSAGE.to_string(),
            },
            GateState::Halted => Screen::Message {
                title: INVALID_LINK_TITLE.to_string(),
                message: INVALID_LINK_MESSAGE.to_string(),
            },
        }
    }
}

/// Top-level page content.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Screen {
    /// Practitioner app with one view on screen
    Practice { view: View },
    /// Form-only intake page
    #[serde(rename_all = "camelCase")]
    IntakeForm { client_name: String },
    /// A static page with nothing else on it
    Message { title: String, message: String },
}

impl Screen {
    /// The static page shown when startup configuration is unusable.
    pub fn configuration_error(error: &ConfigError) -> Self {
        Screen::Message {
            title: CONFIG_ERROR_TITLE.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result of a handler: something to show, a toast, both or neither.
///
/// Neither means the action was blocked or declined.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: Option<T>,
    pub notice: Option<Notice>,
}

impl<T> Outcome<T> {
    pub fn shown(value: T) -> Self {
        Self {
            value: Some(value),
            notice: None,
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            value: None,
            notice: Some(Notice::error(message)),
        }
    }

    pub fn nothing() -> Self {
        Self {
            value: None,
            notice: None,
        }
    }

    fn with_success(mut self, message: &str) -> Self {
        self.notice = Some(Notice::success(message));
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: self.value.map(f),
            notice: self.notice,
        }
    }
}

/// The page controller.
pub struct Practice<S: RecordStore> {
    store: S,
    config: PracticeConfig,
    directory: ClientDirectory,
    listing: DirectoryListing,
    booted: bool,
}

impl<S: RecordStore> Practice<S> {
    pub fn new(store: S, config: PracticeConfig) -> Self {
        let directory = ClientDirectory::new(config.search_debounce());
        Self {
            store,
            config,
            directory,
            listing: DirectoryListing::default(),
            booted: false,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Page load. An intake token in `location` opens the intake gate and
    /// skips the practitioner app entirely.
    ///
    /// The token is read on the first boot only. Later boots reload the
    /// directory in practitioner mode and leave an intake page untouched.
    pub fn boot(
        &mut self,
        state: &mut AppState,
        location: &str,
        today: NaiveDate,
    ) -> Option<Notice> {
        if !state.gate.is_normal() {
            debug!(gate = state.gate.name(), "Ignoring boot outside practitioner mode");
            return None;
        }
        if !self.booted {
            self.booted = true;
            if let Some(token) = intake::intake_token(location, &self.config.intake_param) {
                state.gate = intake::enter(&self.store, &token, today);
                info!(gate = state.gate.name(), "Booted into intake mode");
                return None;
            }
            debug!("Booted into practitioner mode");
        }
        self.reload_directory()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Show a view. Entering the directory reloads it.
    pub fn switch_to(&mut self, state: &mut AppState, view: View) -> Option<Notice> {
        match state.views.switch_to(&state.gate, view) {
            ViewChange::Shown {
                reload_directory: true,
            } => self.reload_directory(),
            _ => None,
        }
    }

    // =========================================================================
    // Directory
    // =========================================================================

    /// Clients currently on screen.
    pub fn listing(&self) -> &DirectoryListing {
        &self.listing
    }

    pub fn client_cards(&self) -> Vec<ClientCard> {
        client_cards(&self.listing)
    }

    fn reload_directory(&mut self) -> Option<Notice> {
        match self.directory.list_all(&self.store) {
            Ok(listing) => {
                self.show_listing(listing);
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to load clients");
                Some(Notice::error("Failed to load clients. Please try again."))
            }
        }
    }

    /// Rows go on screen with their counts still loading.
    fn show_listing(&mut self, listing: DirectoryListing) {
        self.listing = listing;
    }

    /// Fetch one row's session count. A failed fetch shows zero.
    ///
    /// Returns `None` when the row has left the listing in the meantime.
    pub fn load_session_count(&mut self, client_id: &str) -> Option<SessionCount> {
        let count = ClientDirectory::session_count(&self.store, client_id);
        if self.listing.apply_count(client_id, count) {
            Some(SessionCount::Known(count))
        } else {
            None
        }
    }

    /// Search box input; the search itself runs from [`Self::poll_search`].
    pub fn search_input(&mut self, state: &AppState, query: &str, now: Instant) {
        if state.gate.is_normal() {
            self.directory.search_input(query, now);
        }
    }

    /// Run a due search. A failed search keeps the last full load on screen.
    pub fn poll_search(&mut self, state: &AppState, now: Instant) -> Option<Notice> {
        if !state.gate.is_normal() {
            return None;
        }
        match self.directory.poll_search(&self.store, now)? {
            Ok(listing) => {
                self.show_listing(listing);
                None
            }
            Err(e) => {
                warn!(error = %e, "Search failed");
                let fallback = self.directory.last_loaded();
                self.show_listing(fallback);
                Some(Notice::error("Search failed. Please try again."))
            }
        }
    }

    /// When the shell should call [`Self::poll_search`] next.
    pub fn search_deadline(&self) -> Option<Instant> {
        self.directory.search_deadline()
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Open a client's detail page.
    pub fn view_client(&mut self, state: &mut AppState, id: &str) -> Outcome<ClientDetailView> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        let client = match self.directory.get_by_id(&self.store, id) {
            Ok(client) => client,
            Err(DirectoryError::NotFound(_)) => return Outcome::failed("Client not found"),
            Err(e) => {
                warn!(client_id = id, error = %e, "Failed to load client");
                return Outcome::failed("Failed to load client details");
            }
        };
        let partition = match SessionWorkflow::new(&self.store).list_for_client(&client.id) {
            Ok(partition) => partition,
            Err(e) => {
                warn!(client_id = id, error = %e, "Failed to load sessions");
                return Outcome::failed("Failed to load client details");
            }
        };
        state.current_client_id = Some(client.id.clone());
        state.views.switch_to(&state.gate, View::ClientDetail);
        Outcome::shown(ClientDetailView::new(&client, &partition))
    }

    /// The new-client form, blank.
    pub fn new_client(&mut self, state: &mut AppState) -> Outcome<ClientForm> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        state.views.switch_to(&state.gate, View::NewClient);
        Outcome::shown(ClientForm::blank())
    }

    /// The client form pre-filled with the current client.
    pub fn edit_client(&mut self, state: &mut AppState) -> Outcome<ClientForm> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        let Some(id) = state.current_client_id.clone() else {
            return Outcome::nothing();
        };
        match self.directory.get_by_id(&self.store, &id) {
            Ok(client) => {
                state.views.switch_to(&state.gate, View::NewClient);
                Outcome::shown(ClientForm::edit(&client))
            }
            Err(DirectoryError::NotFound(_)) => Outcome::failed("Client not found"),
            Err(e) => {
                warn!(client_id = %id, error = %e, "Failed to load client");
                Outcome::failed("Failed to load client details")
            }
        }
    }

    /// Client form submit. Success returns to the refreshed directory.
    pub fn save_client(
        &mut self,
        state: &mut AppState,
        form: &ClientForm,
        today: NaiveDate,
    ) -> Outcome<Client> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        let result = match form.client_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => self.directory.update(&self.store, id, form.fields.clone(), today),
            None => self.directory.create(&self.store, form.fields.clone(), today),
        };
        match result {
            Ok(client) => {
                let mut outcome = Outcome::shown(client).with_success("Client saved successfully!");
                if let Some(notice) = self.switch_to(state, View::Directory) {
                    outcome.notice = Some(notice);
                }
                outcome
            }
            Err(DirectoryError::NameRequired) => {
                Outcome::failed(&DirectoryError::NameRequired.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Failed to save client");
                Outcome::failed("Failed to save client. Please try again.")
            }
        }
    }

    /// Delete the current client and its sessions after confirmation.
    pub fn delete_client(&mut self, state: &mut AppState, confirmer: &dyn Confirmer) -> Outcome<()> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        let Some(id) = state.current_client_id.clone() else {
            return Outcome::nothing();
        };
        match self.directory.delete(&self.store, &id, confirmer) {
            Ok(false) => Outcome::nothing(),
            Ok(true) => {
                state.current_client_id = None;
                let mut outcome = Outcome::shown(()).with_success("Client deleted successfully!");
                if let Some(notice) = self.switch_to(state, View::Directory) {
                    outcome.notice = Some(notice);
                }
                outcome
            }
            Err(e) => {
                warn!(client_id = %id, error = %e, "Failed to delete client");
                Outcome::failed("Failed to delete client. Please try again.")
            }
        }
    }

    /// The public intake link for the current client.
    pub fn intake_link(&self, state: &AppState) -> Option<String> {
        let id = state.current_client_id.as_deref()?;
        Some(intake_link_for(&self.config, id))
    }

    /// Copy the current client's intake link.
    pub fn copy_intake_link(&self, state: &AppState, clipboard: &dyn Clipboard) -> Outcome<CopyOutcome> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        match self.intake_link(state) {
            Some(link) => match copy_or_fallback(clipboard, link) {
                copied @ CopyOutcome::Copied(_) => {
                    Outcome::shown(copied).with_success("Link copied to clipboard!")
                }
                manual => Outcome::shown(manual),
            },
            None => Outcome::nothing(),
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// A blank session form for the current client.
    pub fn new_session(&mut self, state: &mut AppState, today: NaiveDate) -> Outcome<SessionForm> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        let Some(client) = self.current_client(state) else {
            return Outcome::failed("Failed to load client");
        };
        state.current_session_id = None;
        state.views.switch_to(&state.gate, View::NewSession);
        let date = today.format("%Y-%m-%d").to_string();
        Outcome::shown(SessionForm::blank(&client.id, &client.name, &date))
    }

    /// The session form pre-filled with the current session.
    pub fn edit_session(&mut self, state: &mut AppState) -> Outcome<SessionForm> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        let Some(id) = state.current_session_id.clone() else {
            return Outcome::nothing();
        };
        let session = match SessionWorkflow::new(&self.store).get_by_id(&id) {
            Ok(session) => session,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Failed to load session");
                return Outcome::failed("Failed to load session");
            }
        };
        let name = self.client_name(&session.client_id);
        state.current_client_id = Some(session.client_id.clone());
        state.views.switch_to(&state.gate, View::NewSession);
        Outcome::shown(SessionForm::edit(&session, name.as_deref().unwrap_or("Client")))
    }

    /// Session form submit. Success shows the owning client.
    pub fn save_session(&mut self, state: &mut AppState, form: &SessionForm) -> Outcome<ClientDetailView> {
        self.save_session_fields(
            state,
            form.session_id.as_deref(),
            &form.client_id,
            form.collect(),
        )
    }

    /// Save session fields collected by the shell; no `session_id` creates.
    pub fn save_session_fields(
        &mut self,
        state: &mut AppState,
        session_id: Option<&str>,
        client_id: &str,
        fields: SessionFields,
    ) -> Outcome<ClientDetailView> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        match SessionWorkflow::new(&self.store).save(session_id, client_id, fields) {
            Ok(session) => {
                state.current_session_id = None;
                self.show_owner(state, &session, "Session saved successfully!")
            }
            Err(e) => {
                warn!(client_id, error = %e, "Failed to save session");
                Outcome::failed("Failed to save session. Please try again.")
            }
        }
    }

    /// Open a session's detail page.
    pub fn view_session(&mut self, state: &mut AppState, id: &str) -> Outcome<SessionDetailView> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        let session = match SessionWorkflow::new(&self.store).get_by_id(id) {
            Ok(session) => session,
            Err(e) => {
                warn!(session_id = id, error = %e, "Failed to load session");
                return Outcome::failed("Failed to load session details");
            }
        };
        let name = self.client_name(&session.client_id);
        state.current_session_id = Some(session.id.clone());
        state.views.switch_to(&state.gate, View::SessionDetail);
        Outcome::shown(SessionDetailView::new(&session, name.as_deref()))
    }

    /// Delete the current session after confirmation.
    pub fn delete_session(
        &mut self,
        state: &mut AppState,
        confirmer: &dyn Confirmer,
    ) -> Outcome<ClientDetailView> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        let Some(id) = state.current_session_id.clone() else {
            return Outcome::nothing();
        };
        match SessionWorkflow::new(&self.store).delete(&id, confirmer) {
            Ok(None) => Outcome::nothing(),
            Ok(Some(session)) => {
                state.current_session_id = None;
                self.show_owner(state, &session, "Session deleted successfully!")
            }
            Err(SessionError::NotFound(_)) => {
                state.current_session_id = None;
                let mut outcome = Outcome::failed("Failed to delete session");
                if let Some(notice) = self.switch_to(state, View::Directory) {
                    outcome.notice = Some(notice);
                }
                outcome
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Failed to delete session");
                Outcome::failed("Failed to delete session")
            }
        }
    }

    /// Approve a pending session and show its client.
    pub fn approve_session(&mut self, state: &mut AppState, id: &str) -> Outcome<ClientDetailView> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        match SessionWorkflow::new(&self.store).approve(id) {
            Ok(session) => self.show_owner(state, &session, "Session approved!"),
            Err(e) => {
                warn!(session_id = id, error = %e, "Failed to approve session");
                Outcome::failed("Failed to approve session")
            }
        }
    }

    /// Delete a pending session after confirmation and show its client.
    pub fn reject_session(
        &mut self,
        state: &mut AppState,
        id: &str,
        confirmer: &dyn Confirmer,
    ) -> Outcome<ClientDetailView> {
        if !state.gate.is_normal() {
            return Outcome::nothing();
        }
        match SessionWorkflow::new(&self.store).reject(id, confirmer) {
            Ok(None) => Outcome::nothing(),
            Ok(Some(session)) => {
                if state.current_session_id.as_deref() == Some(id) {
                    state.current_session_id = None;
                }
                self.show_owner(state, &session, "Pending session deleted!")
            }
            Err(e) => {
                warn!(session_id = id, error = %e, "Failed to delete pending session");
                Outcome::failed("Failed to delete pending session")
            }
        }
    }

    fn show_owner(
        &mut self,
        state: &mut AppState,
        session: &Session,
        success: &str,
    ) -> Outcome<ClientDetailView> {
        let shown = self.view_client(state, &session.client_id);
        match shown.notice {
            Some(_) => shown,
            None => shown.with_success(success),
        }
    }

    fn current_client(&self, state: &AppState) -> Option<Client> {
        let id = state.current_client_id.as_deref()?;
        match self.directory.get_by_id(&self.store, id) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(client_id = id, error = %e, "Failed to load client");
                None
            }
        }
    }

    fn client_name(&self, client_id: &str) -> Option<String> {
        self.directory
            .get_by_id(&self.store, client_id)
            .ok()
            .map(|c| c.name)
    }

    // =========================================================================
    // Intake
    // =========================================================================

    /// Submit the intake form. A failure keeps the form open for a retry.
    pub fn submit_intake(&self, state: &mut AppState) -> Outcome<Session> {
        match intake::submit(&mut state.gate, &self.store) {
            Ok(session) => Outcome::shown(session),
            Err(IntakeError::NotActive | IntakeError::SubmitInProgress) => Outcome::nothing(),
            Err(_) => Outcome::failed(RETRY_MESSAGE),
        }
    }

    /// Submit intake answers given as JSON.
    pub fn submit_intake_json(&self, state: &mut AppState, payload: &str) -> Outcome<Session> {
        match intake::submit_json(&mut state.gate, &self.store, payload) {
            Ok(session) => Outcome::shown(session),
            Err(IntakeError::NotActive | IntakeError::SubmitInProgress) => Outcome::nothing(),
            Err(IntakeError::InvalidPayload(e)) => {
                warn!(error = %e, "Rejected intake payload");
                Outcome::failed(RETRY_MESSAGE)
            }
            Err(_) => Outcome::failed(RETRY_MESSAGE),
        }
    }
}

/// `public_url` without query or fragment, then `?<param>=<client id>`.
pub fn intake_link_for(config: &PracticeConfig, client_id: &str) -> String {
    let base = config
        .public_url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    format!("{base}?{}={client_id}", config.intake_param)
}

/// The practitioner's client form.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientForm {
    /// Set when editing
    pub client_id: Option<String>,
    pub title: String,
    pub fields: ClientFields,
}

impl ClientForm {
    pub fn blank() -> Self {
        Self {
            client_id: None,
            title: "Add New Client".to_string(),
            fields: ClientFields::default(),
        }
    }

    pub fn edit(client: &Client) -> Self {
        Self {
            client_id: Some(client.id.clone()),
            title: "Edit Client".to_string(),
            fields: client.fields(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::SessionStatus;
    use crate::present::NoticeLevel;
    use crate::store::testing::FlakyStore;
    use std::time::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn config() -> PracticeConfig {
        PracticeConfig::new(":memory:", "https://practice.example.com/app/")
    }

    fn practice() -> Practice<Database> {
        Practice::new(Database::open_in_memory().unwrap(), config())
    }

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    fn boot_at<S: RecordStore>(
        practice: &mut Practice<S>,
        location: &str,
    ) -> (AppState, Option<Notice>) {
        let mut state = AppState::default();
        let notice = practice.boot(&mut state, location, today());
        (state, notice)
    }

    fn add_client(practice: &mut Practice<Database>, state: &mut AppState, name: &str) -> Client {
        let mut form = ClientForm::blank();
        form.fields = ClientFields::named(name);
        practice.save_client(state, &form, today()).value.unwrap()
    }

    #[test]
    fn test_boot_without_token_loads_directory() {
        let mut practice = practice();
        practice
            .store()
            .insert_client(&ClientFields::named("Jane Doe"))
            .unwrap();

        let (state, notice) = boot_at(&mut practice, "https://practice.example.com/app/");
        assert_eq!(notice, None);
        assert_eq!(state.screen(), Screen::Practice { view: View::Directory });
        assert_eq!(practice.listing().len(), 1);
        assert_eq!(practice.listing().rows[0].sessions, SessionCount::Loading);
        assert_eq!(practice.client_cards()[0].sessions, "Loading...");
    }

    #[test]
    fn test_session_counts_load_per_row() {
        let store = FlakyStore::new();
        let jane = store.inner.insert_client(&ClientFields::named("Jane Doe")).unwrap();
        let bob = store.inner.insert_client(&ClientFields::named("Bob Smith")).unwrap();
        store
            .inner
            .insert_session(&jane.id, SessionStatus::Approved, &SessionFields::default())
            .unwrap();
        store.fail_counts_for.borrow_mut().insert(bob.id.clone());
        let mut practice = Practice::new(store, config());
        boot_at(&mut practice, "https://practice.example.com/app/");

        assert_eq!(practice.load_session_count(&bob.id), Some(SessionCount::Known(0)));
        let count_of = |practice: &Practice<FlakyStore>, id: &str| {
            practice
                .listing()
                .rows
                .iter()
                .find(|r| r.client.id == id)
                .map(|r| r.sessions)
        };
        assert_eq!(count_of(&practice, &jane.id), Some(SessionCount::Loading));
        assert_eq!(count_of(&practice, &bob.id), Some(SessionCount::Known(0)));

        assert_eq!(practice.load_session_count(&jane.id), Some(SessionCount::Known(1)));
        assert_eq!(count_of(&practice, &jane.id), Some(SessionCount::Known(1)));
        assert_eq!(practice.load_session_count("gone"), None);
    }

    #[test]
    fn test_boot_with_token_opens_intake() {
        let mut practice = practice();
        let client = practice
            .store()
            .insert_client(&ClientFields::named("Jane Doe"))
            .unwrap();

        let location = format!("https://practice.example.com/app/?client={}", client.id);
        let (state, _) = boot_at(&mut practice, &location);
        assert_eq!(
            state.screen(),
            Screen::IntakeForm {
                client_name: "Jane Doe".into()
            }
        );
        assert!(practice.listing().is_empty());

        let mut fresh = Practice::new(Database::open_in_memory().unwrap(), config());
        let (state, _) = boot_at(&mut fresh, "https://practice.example.com/app/#client=nope");
        assert_eq!(
            state.screen(),
            Screen::Message {
                title: INVALID_LINK_TITLE.into(),
                message: INVALID_LINK_MESSAGE.into()
            }
        );
    }

    #[test]
    fn test_second_boot_keeps_intake_pages() {
        let mut practice = practice();
        let client = practice
            .store()
            .insert_client(&ClientFields::named("Jane Doe"))
            .unwrap();
        let location = format!("https://practice.example.com/app/?client={}", client.id);
        let (mut state, _) = boot_at(&mut practice, &location);

        assert_eq!(practice.boot(&mut state, "https://practice.example.com/app/", today()), None);
        assert!(matches!(state.gate, GateState::IntakeActive(_)));
        assert!(practice.listing().is_empty());

        assert!(practice.submit_intake(&mut state).value.is_some());
        let submitted = state.clone();
        assert_eq!(practice.boot(&mut state, "https://practice.example.com/app/", today()), None);
        assert_eq!(state, submitted);
        assert_eq!(
            state.screen(),
            Screen::Message {
                title: SUBMITTED_TITLE.into(),
                message: SUBMITTED_MESSAGE.into()
            }
        );
        assert!(practice.listing().is_empty());
        assert!(practice.client_cards().is_empty());

        let mut halted = Practice::new(Database::open_in_memory().unwrap(), config());
        let (mut state, _) = boot_at(&mut halted, "https://practice.example.com/app/?client=nope");
        halted.boot(&mut state, "https://practice.example.com/app/", today());
        assert!(matches!(state.gate, GateState::Halted));
        assert!(halted.listing().is_empty());
    }

    #[test]
    fn test_second_boot_reloads_directory_without_reading_token() {
        let mut practice = practice();
        let (mut state, _) = boot_at(&mut practice, "https://practice.example.com/app/");
        let client = practice
            .store()
            .insert_client(&ClientFields::named("Jane Doe"))
            .unwrap();

        let location = format!("https://practice.example.com/app/?client={}", client.id);
        assert_eq!(practice.boot(&mut state, &location, today()), None);
        assert!(state.gate.is_normal());
        assert_eq!(practice.listing().len(), 1);
    }

    #[test]
    fn test_boot_failure_is_a_notice() {
        let store = FlakyStore::new();
        store.fail_all.set(true);
        let mut practice = Practice::new(store, config());
        let (state, notice) = boot_at(&mut practice, "https://practice.example.com/app/");
        assert!(state.gate.is_normal());
        assert_eq!(
            notice,
            Some(Notice::error("Failed to load clients. Please try again."))
        );
    }

    #[test]
    fn test_save_client_returns_to_directory() {
        let mut practice = practice();
        let (mut state, _) = boot_at(&mut practice, "https://practice.example.com/app/");
        practice.new_client(&mut state);
        assert_eq!(state.views.current(), View::NewClient);

        let mut form = ClientForm::blank();
        form.fields = ClientFields::named("Jane Doe");
        form.fields.dob = Some("1990-07-15".into());
        let outcome = practice.save_client(&mut state, &form, today());
        assert_eq!(outcome.notice, Some(Notice::success("Client saved successfully!")));
        assert_eq!(outcome.value.unwrap().age, Some(33));
        assert_eq!(state.views.current(), View::Directory);
        assert_eq!(practice.client_cards().len(), 1);

        let outcome = practice.save_client(&mut state, &ClientForm::blank(), today());
        assert_eq!(outcome.notice, Some(Notice::error("Client name is required")));
    }

    #[test]
    fn test_edit_and_delete_current_client() {
        let mut practice = practice();
        let (mut state, _) = boot_at(&mut practice, "https://practice.example.com/app/");
        let client = add_client(&mut practice, &mut state, "Jane Doe");

        let detail = practice.view_client(&mut state, &client.id);
        assert_eq!(detail.value.unwrap().name, "Jane Doe");
        assert_eq!(state.current_client_id.as_deref(), Some(client.id.as_str()));

        let mut form = practice.edit_client(&mut state).value.unwrap();
        assert_eq!(form.title, "Edit Client");
        form.fields.phone = Some("555-0100".into());
        let saved = practice.save_client(&mut state, &form, today()).value.unwrap();
        assert_eq!(saved.id, client.id);
        assert_eq!(saved.phone.as_deref(), Some("555-0100"));

        practice.view_client(&mut state, &client.id);
        let declined = practice.delete_client(&mut state, &no);
        assert_eq!(declined, Outcome::nothing());
        assert!(practice.store().get_client(&client.id).unwrap().is_some());

        let deleted = practice.delete_client(&mut state, &yes);
        assert_eq!(deleted.notice, Some(Notice::success("Client deleted successfully!")));
        assert_eq!(state.current_client_id, None);
        assert_eq!(state.views.current(), View::Directory);
        assert!(practice.listing().is_empty());
    }

    #[test]
    fn test_view_missing_client() {
        let mut practice = practice();
        let (mut state, _) = boot_at(&mut practice, "https://practice.example.com/app/");
        let outcome = practice.view_client(&mut state, "missing");
        assert_eq!(outcome.notice, Some(Notice::error("Client not found")));
        assert_eq!(state.views.current(), View::Directory);
    }

    #[test]
    fn test_session_lifecycle() {
        let mut practice = practice();
        let (mut state, _) = boot_at(&mut practice, "https://practice.example.com/app/");
        let client = add_client(&mut practice, &mut state, "Jane Doe");
        practice.view_client(&mut state, &client.id);

        let mut form = practice.new_session(&mut state, today()).value.unwrap();
        assert_eq!(form.title, "New Session for Jane Doe");
        assert_eq!(form.fields.date.as_deref(), Some("2024-06-01"));
        form.fields.notes = Some("Follow up in two weeks".into());

        let outcome = practice.save_session(&mut state, &form);
        assert_eq!(outcome.notice, Some(Notice::success("Session saved successfully!")));
        let detail = outcome.value.unwrap();
        assert_eq!(detail.sessions.len(), 1);
        assert_eq!(state.views.current(), View::ClientDetail);

        let session = practice
            .store()
            .list_sessions_for_client(&client.id)
            .unwrap()
            .remove(0);
        let view = practice.view_session(&mut state, &session.id).value.unwrap();
        assert!(!view.reviewable);
        assert_eq!(state.views.current(), View::SessionDetail);

        let edit = practice.edit_session(&mut state).value.unwrap();
        assert_eq!(edit.title, "Edit Session for Jane Doe");
        assert_eq!(edit.session_id.as_deref(), Some(session.id.as_str()));

        let outcome = practice.delete_session(&mut state, &yes);
        assert_eq!(outcome.notice, Some(Notice::success("Session deleted successfully!")));
        assert!(outcome.value.unwrap().has_no_sessions());
        assert_eq!(state.current_session_id, None);
    }

    #[test]
    fn test_approve_and_reject_reload_owner() {
        let mut practice = practice();
        let (mut state, _) = boot_at(&mut practice, "https://practice.example.com/app/");
        let client = add_client(&mut practice, &mut state, "Jane Doe");
        let workflow = SessionWorkflow::new(practice.store());
        let first = workflow
            .create_pending(&client.id, SessionFields::default())
            .unwrap();
        let second = workflow
            .create_pending(&client.id, SessionFields::default())
            .unwrap();

        let outcome = practice.approve_session(&mut state, &first.id);
        assert_eq!(outcome.notice, Some(Notice::success("Session approved!")));
        let detail = outcome.value.unwrap();
        assert_eq!(detail.pending.len(), 1);
        assert_eq!(detail.sessions.len(), 1);
        assert_eq!(state.current_client_id.as_deref(), Some(client.id.as_str()));

        let outcome = practice.reject_session(&mut state, &first.id, &yes);
        assert_eq!(outcome.notice.map(|n| n.level), Some(NoticeLevel::Error));

        assert_eq!(practice.reject_session(&mut state, &second.id, &no), Outcome::nothing());
        let outcome = practice.reject_session(&mut state, &second.id, &yes);
        assert_eq!(outcome.notice, Some(Notice::success("Pending session deleted!")));
        assert!(outcome.value.unwrap().pending.is_empty());
        assert_eq!(
            practice.store().get_session(&first.id).unwrap().map(|s| s.status),
            Some(SessionStatus::Approved)
        );
    }

    #[test]
    fn test_intake_link() {
        let mut practice = Practice::new(
            Database::open_in_memory().unwrap(),
            PracticeConfig::new(":memory:", "https://practice.example.com/app/?ref=mail#top"),
        );
        let (mut state, _) = boot_at(&mut practice, "https://practice.example.com/app/");
        assert_eq!(practice.intake_link(&state), None);

        let client = add_client(&mut practice, &mut state, "Jane Doe");
        practice.view_client(&mut state, &client.id);
        assert_eq!(
            practice.intake_link(&state),
            Some(format!("https://practice.example.com/app/?client={}", client.id))
        );

        struct Denied;
        impl Clipboard for Denied {
            fn write_text(&self, _: &str) -> Result<(), String> {
                Err("not allowed".into())
            }
        }
        let outcome = practice.copy_intake_link(&state, &Denied);
        assert_eq!(outcome.notice, None);
        assert!(matches!(outcome.value, Some(CopyOutcome::ManualCopy(_))));
    }

    #[test]
    fn test_debounced_search_through_controller() {
        let mut practice = Practice::new(
            Database::open_in_memory().unwrap(),
            PracticeConfig::new(":memory:", "https://practice.example.com/"),
        );
        let (mut state, _) = boot_at(&mut practice, "https://practice.example.com/");
        for name in ["Jane Doe", "Janet Lee", "Bob Smith"] {
            add_client(&mut practice, &mut state, name);
        }

        let start = Instant::now();
        practice.search_input(&state, "bo", start);
        practice.search_input(&state, "jan", start + Duration::from_millis(100));
        assert_eq!(practice.poll_search(&state, start + Duration::from_millis(200)), None);
        assert_eq!(practice.listing().len(), 3);

        let due = practice.search_deadline().unwrap();
        assert_eq!(practice.poll_search(&state, due), None);
        let mut names: Vec<_> = practice
            .listing()
            .rows
            .iter()
            .map(|r| r.client.name.as_str())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Jane Doe", "Janet Lee"]);
    }

    #[test]
    fn test_failed_search_falls_back_to_last_load() {
        let store = FlakyStore::new();
        store.inner.insert_client(&ClientFields::named("Jane Doe")).unwrap();
        let mut practice = Practice::new(store, config());
        let (state, _) = boot_at(&mut practice, "https://practice.example.com/app/");

        practice.store().fail_all.set(true);
        let start = Instant::now();
        practice.search_input(&state, "zzz", start);
        let notice = practice.poll_search(&state, start + Duration::from_secs(1));
        assert_eq!(notice, Some(Notice::error("Search failed. Please try again.")));
        assert_eq!(practice.listing().len(), 1);
    }

    #[test]
    fn test_intake_blocks_practitioner_handlers() {
        let mut practice = practice();
        let client = practice
            .store()
            .insert_client(&ClientFields::named("Jane Doe"))
            .unwrap();
        let location = format!("https://practice.example.com/app/?client={}", client.id);
        let (mut state, _) = boot_at(&mut practice, &location);

        assert_eq!(practice.view_client(&mut state, &client.id), Outcome::nothing());
        assert_eq!(practice.switch_to(&mut state, View::Directory), None);
        assert!(practice.listing().is_empty());

        let outcome = practice.submit_intake_json(
            &mut state,
            r#"{"date":"2024-06-03","status":"approved","notes":"hidden"}"#,
        );
        let session = outcome.value.unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.fields.notes, None);
        assert_eq!(
            state.screen(),
            Screen::Message {
                title: SUBMITTED_TITLE.into(),
                message: SUBMITTED_MESSAGE.into()
            }
        );
        assert_eq!(practice.submit_intake(&mut state), Outcome::nothing());
    }

    #[test]
    fn test_intake_failure_offers_retry() {
        let store = FlakyStore::new();
        let client = store.inner.insert_client(&ClientFields::named("Jane Doe")).unwrap();
        let practice_config = config();
        let mut practice = Practice::new(store, practice_config);
        let location = format!("https://practice.example.com/app/?client={}", client.id);
        let (mut state, _) = boot_at(&mut practice, &location);

        practice.store().fail_inserts.set(true);
        let outcome = practice.submit_intake(&mut state);
        assert_eq!(outcome.notice, Some(Notice::error(RETRY_MESSAGE)));
        assert!(state.gate.form().unwrap().submit.is_enabled());

        practice.store().fail_inserts.set(false);
        assert!(practice.submit_intake(&mut state).value.is_some());
        assert!(matches!(state.gate, GateState::IntakeSubmitted));
    }

    #[test]
    fn test_configuration_error_screen() {
        let err = PracticeConfig::from_json_str(r#"{"publicUrl":"https://x.example"}"#).unwrap_err();
        match Screen::configuration_error(&err) {
            Screen::Message { title, .. } => assert_eq!(title, CONFIG_ERROR_TITLE),
            other => panic!("unexpected screen {other:?}"),
        }
    }
}

//! Client directory: listing, search, create, edit and delete.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::debounce::Debouncer;
use crate::interact::Confirmer;
use crate::models::{Client, ClientFields};
use crate::store::{RecordStore, StoreError};

pub const DELETE_CLIENT_PROMPT: &str =
    "Are you sure you want to delete this client? This will also delete all associated sessions.";

/// Client directory errors.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Client name is required")]
    NameRequired,

    #[error("Client not found: {0}")]
    NotFound(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Session count shown on a directory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCount {
    /// Rendered before the count has been fetched
    Loading,
    Known(usize),
}

impl SessionCount {
    pub fn label(self) -> String {
        match self {
            SessionCount::Loading => "Loading...".to_string(),
            SessionCount::Known(1) => "1 session".to_string(),
            SessionCount::Known(n) => format!("{n} sessions"),
        }
    }
}

/// One client in the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryRow {
    pub client: Client,
    pub sessions: SessionCount,
}

/// The clients currently on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryListing {
    pub rows: Vec<DirectoryRow>,
}

impl DirectoryListing {
    /// Rows render immediately; counts arrive later.
    pub fn new(clients: Vec<Client>) -> Self {
        Self {
            rows: clients
                .into_iter()
                .map(|client| DirectoryRow {
                    client,
                    sessions: SessionCount::Loading,
                })
                .collect(),
        }
    }

    /// True when the shell should show the "No clients found" state.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.client.id.clone()).collect()
    }

    /// Apply a fetched count. Returns false if the row is no longer listed.
    pub fn apply_count(&mut self, client_id: &str, count: usize) -> bool {
        match self.rows.iter_mut().find(|r| r.client.id == client_id) {
            Some(row) => {
                row.sessions = SessionCount::Known(count);
                true
            }
            None => {
                debug!(client_id, "Dropping session count for a row no longer listed");
                false
            }
        }
    }
}

/// Client directory state: the last loaded set and the pending search.
pub struct ClientDirectory {
    loaded: Vec<Client>,
    search: Debouncer<String>,
}

impl ClientDirectory {
    pub fn new(search_delay: Duration) -> Self {
        Self {
            loaded: Vec::new(),
            search: Debouncer::new(search_delay),
        }
    }

    /// Clients from the most recent full load.
    pub fn loaded(&self) -> &[Client] {
        &self.loaded
    }

    /// Listing of the most recent full load, without a store call.
    pub fn last_loaded(&self) -> DirectoryListing {
        DirectoryListing::new(self.loaded.clone())
    }

    /// Load every client, newest first.
    pub fn list_all<S: RecordStore + ?Sized>(&mut self, store: &S) -> DirectoryResult<DirectoryListing> {
        self.loaded = store.list_clients()?;
        debug!(count = self.loaded.len(), "Loaded clients");
        Ok(self.last_loaded())
    }

    /// Search name, email and phone. A blank query shows the last loaded set.
    pub fn search_by_text<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        query: &str,
    ) -> DirectoryResult<DirectoryListing> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(self.last_loaded());
        }
        let clients = store.search_clients(query)?;
        debug!(query, count = clients.len(), "Searched clients");
        Ok(DirectoryListing::new(clients))
    }

    /// Record search input. Earlier pending input is discarded.
    pub fn search_input(&mut self, query: impl Into<String>, now: Instant) {
        self.search.schedule(query.into(), now);
    }

    /// Run the pending search once the input has been quiet long enough.
    pub fn poll_search<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        now: Instant,
    ) -> Option<DirectoryResult<DirectoryListing>> {
        let query = self.search.poll(now)?;
        Some(self.search_by_text(store, &query))
    }

    /// When the pending search fires, if there is one.
    pub fn search_deadline(&self) -> Option<Instant> {
        self.search.deadline()
    }

    pub fn get_by_id<S: RecordStore + ?Sized>(&self, store: &S, id: &str) -> DirectoryResult<Client> {
        store
            .get_client(id)?
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }

    /// Create a client, then reload the directory.
    pub fn create<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        fields: ClientFields,
        today: NaiveDate,
    ) -> DirectoryResult<Client> {
        let fields = prepare(fields, today)?;
        let client = store.insert_client(&fields)?;
        debug!(client_id = %client.id, "Created client");
        self.refresh(store);
        Ok(client)
    }

    /// Replace a client's fields, then reload the directory.
    pub fn update<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        id: &str,
        fields: ClientFields,
        today: NaiveDate,
    ) -> DirectoryResult<Client> {
        let fields = prepare(fields, today)?;
        store.update_client(id, &fields).map_err(|e| match e {
            StoreError::NotFound(_) => DirectoryError::NotFound(id.to_string()),
            other => other.into(),
        })?;
        debug!(client_id = id, "Updated client");
        self.refresh(store);
        self.get_by_id(store, id)
    }

    /// Delete a client and its sessions after confirmation.
    ///
    /// Returns `Ok(false)` when the user declines.
    pub fn delete<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        id: &str,
        confirmer: &dyn Confirmer,
    ) -> DirectoryResult<bool> {
        if !confirmer.confirm(DELETE_CLIENT_PROMPT) {
            return Ok(false);
        }
        store.delete_client(id).map_err(|e| match e {
            StoreError::NotFound(_) => DirectoryError::NotFound(id.to_string()),
            other => other.into(),
        })?;
        debug!(client_id = id, "Deleted client");
        self.refresh(store);
        Ok(true)
    }

    /// Session count for one directory row.
    ///
    /// A failed fetch counts as zero sessions and affects no other row.
    pub fn session_count<S: RecordStore + ?Sized>(store: &S, client_id: &str) -> usize {
        match store.count_sessions_for_client(client_id) {
            Ok(count) => count,
            Err(e) => {
                warn!(client_id, error = %e, "Failed to count sessions");
                0
            }
        }
    }

    fn refresh<S: RecordStore + ?Sized>(&mut self, store: &S) {
        if let Err(e) = self.list_all(store) {
            warn!(error = %e, "Failed to reload clients");
        }
    }
}

fn prepare(fields: ClientFields, today: NaiveDate) -> DirectoryResult<ClientFields> {
    if !fields.has_name() {
        return Err(DirectoryError::NameRequired);
    }
    let mut fields = fields.normalized();
    fields.fill_age_from_dob(today);
    Ok(fields)
}

//! Session workflow: create, edit, delete, approve and reject sessions.
//!
//! ```text
//!   practitioner form ──create──▶ Approved
//!   intake form ───────create──▶ Pending ──approve──▶ Approved
//!                                   │
//!                                   └──reject──▶ (deleted)
//! ```
//!
//! Editing a session never changes its status.

use thiserror::Error;
use tracing::{debug, info};

use crate::interact::Confirmer;
use crate::models::{Session, SessionFields, SessionPartition, SessionStatus, SubTableKind, TableGrid};
use crate::signature::{SignaturePad, SignatureSurface};
use crate::store::{RecordStore, StoreError};

pub const DELETE_SESSION_PROMPT: &str = "Are you sure you want to delete this session?";
pub const REJECT_SESSION_PROMPT: &str =
    "Are you sure you want to delete this pending session? This action cannot be undone.";

/// Session workflow errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Session {0} is not pending")]
    NotPending(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Session operations over a record store.
pub struct SessionWorkflow<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> SessionWorkflow<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn get_by_id(&self, id: &str) -> SessionResult<Session> {
        self.store
            .get_session(id)?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// All sessions of a client, pending and approved apart.
    pub fn list_for_client(&self, client_id: &str) -> SessionResult<SessionPartition> {
        let sessions = self.store.list_sessions_for_client(client_id)?;
        let partition = SessionPartition::from_sessions(sessions);
        debug!(
            client_id,
            pending = partition.pending.len(),
            approved = partition.approved.len(),
            "Listed sessions"
        );
        Ok(partition)
    }

    /// Practitioner-created session; always approved.
    pub fn create_for_client(&self, client_id: &str, fields: SessionFields) -> SessionResult<Session> {
        self.create(client_id, SessionStatus::Approved, fields)
    }

    /// Client-submitted session; always pending.
    pub fn create_pending(&self, client_id: &str, fields: SessionFields) -> SessionResult<Session> {
        self.create(client_id, SessionStatus::Pending, fields)
    }

    fn create(
        &self,
        client_id: &str,
        status: SessionStatus,
        fields: SessionFields,
    ) -> SessionResult<Session> {
        if self.store.get_client(client_id)?.is_none() {
            return Err(SessionError::ClientNotFound(client_id.to_string()));
        }
        let session = self
            .store
            .insert_session(client_id, status, &fields.normalized())?;
        info!(
            session_id = %session.id,
            client_id,
            status = status.as_str(),
            "Created session"
        );
        Ok(session)
    }

    /// Replace the form content of a session, keeping its status.
    pub fn update(&self, id: &str, fields: SessionFields) -> SessionResult<Session> {
        self.store
            .update_session(id, &fields.normalized())
            .map_err(|e| not_found_as(e, id))?;
        debug!(session_id = id, "Updated session");
        self.get_by_id(id)
    }

    /// Form submit: update when editing an existing session, else create.
    pub fn save(
        &self,
        existing_id: Option<&str>,
        client_id: &str,
        fields: SessionFields,
    ) -> SessionResult<Session> {
        match existing_id.filter(|id| !id.is_empty()) {
            Some(id) => self.update(id, fields),
            None => self.create_for_client(client_id, fields),
        }
    }

    /// Mark a session approved. Approving twice is harmless.
    pub fn approve(&self, id: &str) -> SessionResult<Session> {
        let status = self.get_by_id(id)?.status.approve();
        self.store
            .update_session_status(id, status)
            .map_err(|e| not_found_as(e, id))?;
        info!(session_id = id, "Approved session");
        self.get_by_id(id)
    }

    /// Delete a session after confirmation.
    ///
    /// Returns the deleted session, or `None` when the user declines.
    pub fn delete(&self, id: &str, confirmer: &dyn Confirmer) -> SessionResult<Option<Session>> {
        if !confirmer.confirm(DELETE_SESSION_PROMPT) {
            return Ok(None);
        }
        self.remove(id).map(Some)
    }

    /// Delete a pending session after confirmation.
    ///
    /// Returns the rejected session, or `None` when the user declines.
    pub fn reject(&self, id: &str, confirmer: &dyn Confirmer) -> SessionResult<Option<Session>> {
        if !confirmer.confirm(REJECT_SESSION_PROMPT) {
            return Ok(None);
        }
        let session = self.get_by_id(id)?;
        if !session.status.is_pending() {
            return Err(SessionError::NotPending(id.to_string()));
        }
        self.remove(id).map(Some)
    }

    fn remove(&self, id: &str) -> SessionResult<Session> {
        let session = self.get_by_id(id)?;
        self.store
            .delete_session(id)
            .map_err(|e| not_found_as(e, id))?;
        info!(session_id = id, client_id = %session.client_id, "Deleted session");
        Ok(session)
    }
}

/// The practitioner's session form, for a new or an existing session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionForm {
    /// Set when editing
    pub session_id: Option<String>,
    pub client_id: String,
    pub title: String,
    pub fields: SessionFields,
    grids: Vec<TableGrid>,
}

impl SessionForm {
    /// Blank form dated `date`, one empty row per sub-table.
    pub fn blank(client_id: impl Into<String>, client_name: &str, date: &str) -> Self {
        Self {
            session_id: None,
            client_id: client_id.into(),
            title: format!("New Session for {client_name}"),
            fields: SessionFields {
                date: Some(date.to_string()),
                ..Default::default()
            },
            grids: SubTableKind::ALL.iter().map(|&k| TableGrid::blank(k)).collect(),
        }
    }

    /// Form pre-filled from a saved session.
    pub fn edit(session: &Session, client_name: &str) -> Self {
        Self {
            session_id: Some(session.id.clone()),
            client_id: session.client_id.clone(),
            title: format!("Edit Session for {client_name}"),
            fields: SessionFields {
                tables: Default::default(),
                ..session.fields.clone()
            },
            grids: SubTableKind::ALL
                .iter()
                .map(|&k| TableGrid::from_cells(k, session.fields.tables.cells(k)))
                .collect(),
        }
    }

    pub fn grids(&self) -> &[TableGrid] {
        &self.grids
    }

    pub fn grid_mut(&mut self, kind: SubTableKind) -> Option<&mut TableGrid> {
        self.grids.iter_mut().find(|g| g.kind() == kind)
    }

    /// Show the saved therapist signature on the pad.
    pub fn load_signature<P: SignatureSurface>(&self, pad: &mut SignaturePad<P>) {
        pad.load(self.fields.therapist_signature.as_deref());
    }

    /// Take the pad's current value as the therapist signature.
    pub fn take_signature<P: SignatureSurface>(&mut self, pad: &SignaturePad<P>) {
        self.fields.therapist_signature = pad.value().map(str::to_string);
    }

    /// Form content as session fields.
    pub fn collect(&self) -> SessionFields {
        let mut fields = self.fields.clone();
        for grid in &self.grids {
            fields.tables.set_from_grid(grid.kind(), grid.rows());
        }
        fields
    }
}

fn not_found_as(e: StoreError, id: &str) -> SessionError {
    match e {
        StoreError::NotFound(_) => SessionError::NotFound(id.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ClientFields, ComplaintRow};
    use crate::signature::testing::RecordingSurface;
    use crate::signature::Point;

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let client = db.insert_client(&ClientFields::named("Jane Doe")).unwrap();
        (db, client.id)
    }

    fn on(date: &str) -> SessionFields {
        SessionFields {
            date: Some(date.into()),
            ..Default::default()
        }
    }

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    #[test]
    fn test_practitioner_sessions_are_approved() {
        let (db, client_id) = setup();
        let workflow = SessionWorkflow::new(&db);
        let session = workflow.create_for_client(&client_id, on("2024-03-01")).unwrap();
        assert_eq!(session.status, SessionStatus::Approved);
    }

    #[test]
    fn test_create_for_unknown_client() {
        let db = Database::open_in_memory().unwrap();
        let workflow = SessionWorkflow::new(&db);
        let result = workflow.create_for_client("missing", on("2024-03-01"));
        assert!(matches!(result, Err(SessionError::ClientNotFound(_))));
    }

    #[test]
    fn test_update_preserves_pending_status() {
        let (db, client_id) = setup();
        let workflow = SessionWorkflow::new(&db);
        let session = workflow.create_pending(&client_id, on("2024-03-01")).unwrap();

        let mut fields = session.fields.clone();
        fields.practitioner = Some("Sam".into());
        fields.tables.complaints.push(ComplaintRow {
            complaint: "back pain".into(),
            ..Default::default()
        });
        let updated = workflow.save(Some(&session.id), &client_id, fields).unwrap();

        assert_eq!(updated.status, SessionStatus::Pending);
        assert_eq!(updated.fields.practitioner, Some("Sam".into()));
        assert_eq!(updated.complaint_names(), vec!["back pain"]);
    }

    #[test]
    fn test_save_without_id_creates() {
        let (db, client_id) = setup();
        let workflow = SessionWorkflow::new(&db);
        let created = workflow.save(None, &client_id, on("2024-03-01")).unwrap();
        let also_created = workflow.save(Some(""), &client_id, on("2024-03-02")).unwrap();
        assert_ne!(created.id, also_created.id);
        assert_eq!(db.count_sessions_for_client(&client_id).unwrap(), 2);
    }

    #[test]
    fn test_approve_is_idempotent() {
        let (db, client_id) = setup();
        let workflow = SessionWorkflow::new(&db);
        let session = workflow.create_pending(&client_id, on("2024-03-01")).unwrap();

        assert_eq!(workflow.approve(&session.id).unwrap().status, SessionStatus::Approved);
        assert_eq!(workflow.approve(&session.id).unwrap().status, SessionStatus::Approved);
        assert!(matches!(
            workflow.approve("missing"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_reject_requires_confirmation_and_pending() {
        let (db, client_id) = setup();
        let workflow = SessionWorkflow::new(&db);
        let pending = workflow.create_pending(&client_id, on("2024-03-01")).unwrap();
        let approved = workflow.create_for_client(&client_id, on("2024-02-01")).unwrap();

        assert!(workflow.reject(&pending.id, &no).unwrap().is_none());
        assert!(db.get_session(&pending.id).unwrap().is_some());

        assert!(matches!(
            workflow.reject(&approved.id, &yes),
            Err(SessionError::NotPending(_))
        ));

        let rejected = workflow.reject(&pending.id, &yes).unwrap().unwrap();
        assert_eq!(rejected.client_id, client_id);
        assert!(db.get_session(&pending.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_session() {
        let (db, client_id) = setup();
        let workflow = SessionWorkflow::new(&db);
        let session = workflow.create_for_client(&client_id, on("2024-03-01")).unwrap();

        assert!(workflow.delete(&session.id, &no).unwrap().is_none());
        assert!(workflow.delete(&session.id, &yes).unwrap().is_some());
        assert!(matches!(
            workflow.get_by_id(&session.id),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_for_client_partitions() {
        let (db, client_id) = setup();
        let workflow = SessionWorkflow::new(&db);
        workflow.create_for_client(&client_id, on("2024-01-10")).unwrap();
        workflow.create_pending(&client_id, on("2024-03-01")).unwrap();
        workflow.create_for_client(&client_id, on("2024-02-15")).unwrap();

        let partition = workflow.list_for_client(&client_id).unwrap();
        let dates = |sessions: &[Session]| -> Vec<String> {
            sessions.iter().filter_map(|s| s.fields.date.clone()).collect()
        };
        assert_eq!(dates(&partition.pending), vec!["2024-03-01"]);
        assert_eq!(dates(&partition.approved), vec!["2024-02-15", "2024-01-10"]);
    }

    #[test]
    fn test_form_round_trip_through_edit() {
        let (db, client_id) = setup();
        let workflow = SessionWorkflow::new(&db);

        let mut form = SessionForm::blank(&client_id, "Jane Doe", "2024-03-01");
        assert_eq!(form.title, "New Session for Jane Doe");
        assert!(form.grids().iter().all(|g| g.rows().len() == 1));

        let grid = form.grid_mut(SubTableKind::Complaints).unwrap();
        grid.set_cell(0, 0, "headache");
        grid.add_row();
        grid.set_cell(1, 1, "only since");

        let mut pad = SignaturePad::new(RecordingSurface::default());
        pad.pointer_down(Point::new(0.0, 0.0));
        pad.pointer_move(Point::new(4.0, 4.0));
        pad.pointer_up();
        form.take_signature(&pad);

        let session = workflow
            .save(form.session_id.as_deref(), &form.client_id, form.collect())
            .unwrap();
        assert_eq!(session.complaint_names(), vec!["headache"]);
        assert_eq!(session.fields.tables.complaints.len(), 1);
        assert_eq!(
            session.fields.therapist_signature.as_deref(),
            Some("data:image/png;base64,segments-1")
        );

        let edit = SessionForm::edit(&session, "Jane Doe");
        assert_eq!(edit.title, "Edit Session for Jane Doe");
        assert_eq!(edit.session_id.as_deref(), Some(session.id.as_str()));
        assert_eq!(edit.collect(), session.fields);

        let mut pad = SignaturePad::new(RecordingSurface::default());
        edit.load_signature(&mut pad);
        assert_eq!(pad.value(), session.fields.therapist_signature.as_deref());
    }
}

//! Record Store boundary.
//!
//! Every component talks to persistence through [`RecordStore`]; the bundled
//! SQLite [`Database`] is the implementation shipped with the crate.

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::{Client, ClientFields, Session, SessionFields, SessionStatus};

/// Record Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => StoreError::NotFound(what),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Table-style CRUD over clients and sessions.
pub trait RecordStore {
    /// All clients, newest first.
    fn list_clients(&self) -> StoreResult<Vec<Client>>;

    fn get_client(&self, id: &str) -> StoreResult<Option<Client>>;

    fn insert_client(&self, fields: &ClientFields) -> StoreResult<Client>;

    fn update_client(&self, id: &str, fields: &ClientFields) -> StoreResult<()>;

    /// Delete a client together with all of its sessions.
    fn delete_client(&self, id: &str) -> StoreResult<()>;

    /// Case-insensitive substring match over name, email and phone.
    fn search_clients(&self, query: &str) -> StoreResult<Vec<Client>>;

    fn get_session(&self, id: &str) -> StoreResult<Option<Session>>;

    fn list_sessions_for_client(&self, client_id: &str) -> StoreResult<Vec<Session>>;

    fn insert_session(
        &self,
        client_id: &str,
        status: SessionStatus,
        fields: &SessionFields,
    ) -> StoreResult<Session>;

    /// Replace form content; never touches status.
    fn update_session(&self, id: &str, fields: &SessionFields) -> StoreResult<()>;

    fn update_session_status(&self, id: &str, status: SessionStatus) -> StoreResult<()>;

    fn delete_session(&self, id: &str) -> StoreResult<()>;

    fn count_sessions_for_client(&self, client_id: &str) -> StoreResult<usize> {
        Ok(self.list_sessions_for_client(client_id)?.len())
    }
}

fn found(changed: bool, what: &str, id: &str) -> StoreResult<()> {
    if changed {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("{what} {id}")))
    }
}

impl RecordStore for Database {
    fn list_clients(&self) -> StoreResult<Vec<Client>> {
        Ok(Database::list_clients(self)?)
    }

    fn get_client(&self, id: &str) -> StoreResult<Option<Client>> {
        Ok(Database::get_client(self, id)?)
    }

    fn insert_client(&self, fields: &ClientFields) -> StoreResult<Client> {
        Ok(Database::insert_client(self, fields)?)
    }

    fn update_client(&self, id: &str, fields: &ClientFields) -> StoreResult<()> {
        found(Database::update_client(self, id, fields)?, "Client", id)
    }

    fn delete_client(&self, id: &str) -> StoreResult<()> {
        found(Database::delete_client(self, id)?, "Client", id)
    }

    fn search_clients(&self, query: &str) -> StoreResult<Vec<Client>> {
        Ok(Database::search_clients(self, query)?)
    }

    fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        Ok(Database::get_session(self, id)?)
    }

    fn list_sessions_for_client(&self, client_id: &str) -> StoreResult<Vec<Session>> {
        Ok(Database::list_sessions_for_client(self, client_id)?)
    }

    fn insert_session(
        &self,
        client_id: &str,
        status: SessionStatus,
        fields: &SessionFields,
    ) -> StoreResult<Session> {
        Ok(Database::insert_session(self, client_id, status, fields)?)
    }

    fn update_session(&self, id: &str, fields: &SessionFields) -> StoreResult<()> {
        found(Database::update_session(self, id, fields)?, "Session", id)
    }

    fn update_session_status(&self, id: &str, status: SessionStatus) -> StoreResult<()> {
        found(Database::set_session_status(self, id, status)?, "Session", id)
    }

    fn delete_session(&self, id: &str) -> StoreResult<()> {
        found(Database::delete_session(self, id)?, "Session", id)
    }

    fn count_sessions_for_client(&self, client_id: &str) -> StoreResult<usize> {
        Ok(Database::count_sessions_for_client(self, client_id)?)
    }
}

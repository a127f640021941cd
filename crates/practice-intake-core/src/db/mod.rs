//! SQLite-backed record store.

mod clients;
mod schema;
mod sessions;

pub use schema::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Fixed-width UTC timestamp, so stored values sort lexically.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema and migrate legacy rows.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        if !self.has_column("clients", "search_key")? {
            self.conn.execute(ADD_SEARCH_KEY, [])?;
            debug!("Added client search keys");
        }
        let keyed = self.backfill_search_keys()?;
        if keyed > 0 {
            debug!(rows = keyed, "Backfilled client search keys");
        }
        let migrated = self.conn.execute(MIGRATE_LEGACY_STATUS, [])?;
        if migrated > 0 {
            debug!(rows = migrated, "Marked legacy sessions without status as approved");
        }
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn has_column(&self, table: &str, column: &str) -> DbResult<bool> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        for name in names {
            if name? == column {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"clients".to_string()));
        assert!(tables.contains(&"sessions".to_string()));
    }

    #[test]
    fn test_open_file_migrates_legacy_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("practice.db");

        {
            let db = Database::open(&path).unwrap();
            db.conn()
                .execute_batch(
                    "INSERT INTO clients (id, name, created_at) VALUES ('c1', 'Jane Doe', '2024-01-01T00:00:00+00:00');
                     INSERT INTO sessions (id, client_id, date, status, created_at, updated_at)
                     VALUES ('s1', 'c1', '2024-01-10', NULL, '2024-01-10T00:00:00+00:00', '2024-01-10T00:00:00+00:00');",
                )
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let status: Option<String> = db
            .conn()
            .query_row("SELECT status FROM sessions WHERE id = 's1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status.as_deref(), Some("approved"));
    }

    #[test]
    fn test_open_file_adds_search_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("practice.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE clients (
                     id TEXT PRIMARY KEY, name TEXT NOT NULL, age INTEGER, dob TEXT,
                     email TEXT, phone TEXT, address TEXT, city TEXT, postal TEXT,
                     occupation TEXT, referred_by TEXT, md TEXT, created_at TEXT NOT NULL
                 );
                 INSERT INTO clients (id, name, created_at)
                 VALUES ('c1', 'Élodie Martin', '2024-01-01T00:00:00+00:00');",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.has_column("clients", "search_key").unwrap());
        let found = db.search_clients("ÉLODIE").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "c1");

        drop(db);
        assert!(Database::open(&path).is_ok());
    }
}

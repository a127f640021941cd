//! Session database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, Database, DbError, DbResult};
use crate::models::{Session, SessionFields, SessionStatus, SessionTables};

const SESSION_COLUMNS: &str = r#"
    id, client_id, date, status, practitioner,
    complaints, aggravates, swelling, injury_site,
    medications, healthcare, therapies, implants, injuries, operations,
    exercise, bowen_history, additional, notes,
    client_signature, therapist_signature, created_at, updated_at
"#;

impl Database {
    /// Insert a new session for a client with the given status.
    pub fn insert_session(
        &self,
        client_id: &str,
        status: SessionStatus,
        fields: &SessionFields,
    ) -> DbResult<Session> {
        let now = now_timestamp();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            status,
            fields: fields.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        let tables = TableJson::encode(&session.fields.tables)?;

        self.conn.execute(
            r#"
            INSERT INTO sessions (
                id, client_id, date, status, practitioner,
                complaints, aggravates, swelling, injury_site,
                medications, healthcare, therapies, implants, injuries, operations,
                exercise, bowen_history, additional, notes,
                client_signature, therapist_signature, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23
            )
            "#,
            params![
                session.id,
                session.client_id,
                session.fields.date,
                session.status.as_str(),
                session.fields.practitioner,
                tables.complaints,
                session.fields.aggravates,
                session.fields.swelling,
                session.fields.injury_site,
                tables.medications,
                tables.healthcare,
                tables.therapies,
                session.fields.implants,
                tables.injuries,
                tables.operations,
                session.fields.exercise,
                session.fields.bowen_history,
                session.fields.additional,
                session.fields.notes,
                session.fields.client_signature,
                session.fields.therapist_signature,
                session.created_at,
                session.updated_at,
            ],
        )?;
        Ok(session)
    }

    /// Replace the form content of a session. Status is left untouched.
    pub fn update_session(&self, id: &str, fields: &SessionFields) -> DbResult<bool> {
        let tables = TableJson::encode(&fields.tables)?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE sessions SET
                date = ?2,
                practitioner = ?3,
                complaints = ?4,
                aggravates = ?5,
                swelling = ?6,
                injury_site = ?7,
                medications = ?8,
                healthcare = ?9,
                therapies = ?10,
                implants = ?11,
                injuries = ?12,
                operations = ?13,
                exercise = ?14,
                bowen_history = ?15,
                additional = ?16,
                notes = ?17,
                client_signature = ?18,
                therapist_signature = ?19,
                updated_at = ?20
            WHERE id = ?1
            "#,
            params![
                id,
                fields.date,
                fields.practitioner,
                tables.complaints,
                fields.aggravates,
                fields.swelling,
                fields.injury_site,
                tables.medications,
                tables.healthcare,
                tables.therapies,
                fields.implants,
                tables.injuries,
                tables.operations,
                fields.exercise,
                fields.bowen_history,
                fields.additional,
                fields.notes,
                fields.client_signature,
                fields.therapist_signature,
                now_timestamp(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Set the status of a session.
    pub fn set_session_status(&self, id: &str, status: SessionStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE sessions SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), now_timestamp()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a session by ID.
    pub fn get_session(&self, id: &str) -> DbResult<Option<Session>> {
        self.conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"),
                [id],
                SessionRow::from_row,
            )
            .optional()?
            .map(Session::try_from)
            .transpose()
    }

    /// List all sessions of a client, latest appointment first.
    pub fn list_sessions_for_client(&self, client_id: &str) -> DbResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE client_id = ?
            ORDER BY date DESC, created_at DESC
            "#
        ))?;

        let rows = stmt.query_map([client_id], SessionRow::from_row)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.try_into()?);
        }
        Ok(sessions)
    }

    /// Count the sessions of a client.
    pub fn count_sessions_for_client(&self, client_id: &str) -> DbResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE client_id = ?",
            [client_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete a session.
    pub fn delete_session(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM sessions WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Sub-tables serialized for their JSON columns.
struct TableJson {
    complaints: String,
    medications: String,
    healthcare: String,
    therapies: String,
    injuries: String,
    operations: String,
}

impl TableJson {
    fn encode(tables: &SessionTables) -> DbResult<Self> {
        Ok(Self {
            complaints: serde_json::to_string(&tables.complaints)?,
            medications: serde_json::to_string(&tables.medications)?,
            healthcare: serde_json::to_string(&tables.healthcare)?,
            therapies: serde_json::to_string(&tables.therapies)?,
            injuries: serde_json::to_string(&tables.injuries)?,
            operations: serde_json::to_string(&tables.operations)?,
        })
    }

    fn decode(self) -> DbResult<SessionTables> {
        Ok(SessionTables {
            complaints: serde_json::from_str(&self.complaints)?,
            medications: serde_json::from_str(&self.medications)?,
            healthcare: serde_json::from_str(&self.healthcare)?,
            therapies: serde_json::from_str(&self.therapies)?,
            injuries: serde_json::from_str(&self.injuries)?,
            operations: serde_json::from_str(&self.operations)?,
        })
    }
}

/// Intermediate row struct for database mapping.
struct SessionRow {
    id: String,
    client_id: String,
    date: Option<String>,
    status: Option<String>,
    practitioner: Option<String>,
    tables: TableJson,
    aggravates: Option<String>,
    swelling: Option<String>,
    injury_site: Option<String>,
    implants: Option<String>,
    exercise: Option<String>,
    bowen_history: Option<String>,
    additional: Option<String>,
    notes: Option<String>,
    client_signature: Option<String>,
    therapist_signature: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            client_id: row.get(1)?,
            date: row.get(2)?,
            status: row.get(3)?,
            practitioner: row.get(4)?,
            tables: TableJson {
                complaints: row.get(5)?,
                medications: row.get(9)?,
                healthcare: row.get(10)?,
                therapies: row.get(11)?,
                injuries: row.get(13)?,
                operations: row.get(14)?,
            },
            aggravates: row.get(6)?,
            swelling: row.get(7)?,
            injury_site: row.get(8)?,
            implants: row.get(12)?,
            exercise: row.get(15)?,
            bowen_history: row.get(16)?,
            additional: row.get(17)?,
            notes: row.get(18)?,
            client_signature: row.get(19)?,
            therapist_signature: row.get(20)?,
            created_at: row.get(21)?,
            updated_at: row.get(22)?,
        })
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = DbError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = SessionStatus::from_stored(row.status.as_deref()).ok_or_else(|| {
            DbError::Constraint(format!(
                "Unknown session status: {}",
                row.status.as_deref().unwrap_or_default()
            ))
        })?;

        Ok(Session {
            id: row.id,
            client_id: row.client_id,
            status,
            fields: SessionFields {
                date: row.date,
                practitioner: row.practitioner,
                tables: row.tables.decode()?,
                aggravates: row.aggravates,
                swelling: row.swelling,
                injury_site: row.injury_site,
                implants: row.implants,
                exercise: row.exercise,
                bowen_history: row.bowen_history,
                additional: row.additional,
                notes: row.notes,
                client_signature: row.client_signature,
                therapist_signature: row.therapist_signature,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

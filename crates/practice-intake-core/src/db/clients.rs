//! Client database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, Database, DbResult};
use crate::models::{Client, ClientFields};

const CLIENT_COLUMNS: &str = r#"
    id, name, age, dob, email, phone, address, city, postal,
    occupation, referred_by, md, created_at
"#;

impl Database {
    /// Insert a new client; the store assigns ID and creation time.
    pub fn insert_client(&self, fields: &ClientFields) -> DbResult<Client> {
        let client = Client {
            id: uuid::Uuid::new_v4().to_string(),
            name: fields.name.trim().to_string(),
            age: fields.age,
            dob: fields.dob.clone(),
            email: fields.email.clone(),
            phone: fields.phone.clone(),
            address: fields.address.clone(),
            city: fields.city.clone(),
            postal: fields.postal.clone(),
            occupation: fields.occupation.clone(),
            referred_by: fields.referred_by.clone(),
            md: fields.md.clone(),
            created_at: now_timestamp(),
        };

        self.conn.execute(
            r#"
            INSERT INTO clients (
                id, name, age, dob, email, phone, address, city, postal,
                occupation, referred_by, md, created_at, search_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                client.id,
                client.name,
                client.age,
                client.dob,
                client.email,
                client.phone,
                client.address,
                client.city,
                client.postal,
                client.occupation,
                client.referred_by,
                client.md,
                client.created_at,
                search_key(&client.name, client.email.as_deref(), client.phone.as_deref()),
            ],
        )?;
        Ok(client)
    }

    /// Replace the editable fields of a client.
    pub fn update_client(&self, id: &str, fields: &ClientFields) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE clients SET
                name = ?2,
                age = ?3,
                dob = ?4,
                email = ?5,
                phone = ?6,
                address = ?7,
                city = ?8,
                postal = ?9,
                occupation = ?10,
                referred_by = ?11,
                md = ?12,
                search_key = ?13
            WHERE id = ?1
            "#,
            params![
                id,
                fields.name.trim(),
                fields.age,
                fields.dob,
                fields.email,
                fields.phone,
                fields.address,
                fields.city,
                fields.postal,
                fields.occupation,
                fields.referred_by,
                fields.md,
                search_key(fields.name.trim(), fields.email.as_deref(), fields.phone.as_deref()),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a client by ID.
    pub fn get_client(&self, id: &str) -> DbResult<Option<Client>> {
        self.conn
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"),
                [id],
                client_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all clients, newest first.
    pub fn list_clients(&self) -> DbResult<Vec<Client>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], client_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Case-insensitive substring search over name, email and phone.
    ///
    /// Matches against the stored search key, so case folding follows
    /// Unicode rather than SQLite's ASCII-only `LIKE`.
    pub fn search_clients(&self, query: &str) -> DbResult<Vec<Client>> {
        let needle = query.to_lowercase();
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {CLIENT_COLUMNS}
            FROM clients
            WHERE instr(search_key, ?1) > 0
            ORDER BY created_at DESC, rowid DESC
            "#
        ))?;
        let rows = stmt.query_map([needle], client_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Fill in search keys for rows written without one.
    pub(crate) fn backfill_search_keys(&self) -> DbResult<usize> {
        let unkeyed = {
            let mut stmt = self
                .conn
                .prepare("SELECT id, name, email, phone FROM clients WHERE search_key IS NULL")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        for (id, name, email, phone) in &unkeyed {
            self.conn.execute(
                "UPDATE clients SET search_key = ?2 WHERE id = ?1",
                params![id, search_key(name, email.as_deref(), phone.as_deref())],
            )?;
        }
        Ok(unkeyed.len())
    }

    /// Delete a client. Its sessions go with it.
    pub fn delete_client(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM clients WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        dob: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        address: row.get(6)?,
        city: row.get(7)?,
        postal: row.get(8)?,
        occupation: row.get(9)?,
        referred_by: row.get(10)?,
        md: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Lowercased name, email and phone, one per line.
fn search_key(name: &str, email: Option<&str>, phone: Option<&str>) -> String {
    [Some(name), email, phone]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("\n")
}

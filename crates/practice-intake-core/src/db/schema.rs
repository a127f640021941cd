//! SQLite schema definition.

/// Complete database schema for the practice.
///
/// Column names are the snake_case side of the store boundary
/// (`referred_by`, `injury_site`, `bowen_history`, ...).
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Clients
-- ============================================================================

CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    age INTEGER,
    dob TEXT,                                    -- YYYY-MM-DD
    email TEXT,
    phone TEXT,
    address TEXT,
    city TEXT,
    postal TEXT,
    occupation TEXT,
    referred_by TEXT,
    md TEXT,                                     -- attending physician
    search_key TEXT,                             -- lowercased name, email, phone
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_clients_created ON clients(created_at);
CREATE INDEX IF NOT EXISTS idx_clients_name ON clients(name);

-- ============================================================================
-- Sessions (owned by exactly one client, removed with it)
-- ============================================================================

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    date TEXT,                                   -- appointment date, YYYY-MM-DD
    status TEXT CHECK (status IS NULL OR status IN ('pending', 'approved')),
    practitioner TEXT,
    complaints TEXT NOT NULL DEFAULT '[]',       -- JSON array of ComplaintRow
    aggravates TEXT,
    swelling TEXT,
    injury_site TEXT,
    medications TEXT NOT NULL DEFAULT '[]',      -- JSON array of MedicationRow
    healthcare TEXT NOT NULL DEFAULT '[]',       -- JSON array of HealthcareRow
    therapies TEXT NOT NULL DEFAULT '[]',        -- JSON array of TherapyRow
    implants TEXT,
    injuries TEXT NOT NULL DEFAULT '[]',         -- JSON array of InjuryRow
    operations TEXT NOT NULL DEFAULT '[]',       -- JSON array of OperationRow
    exercise TEXT,
    bowen_history TEXT,
    additional TEXT,
    notes TEXT,
    client_signature TEXT,                       -- image data URI
    therapist_signature TEXT,                    -- image data URI
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_client ON sessions(client_id);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
"#;

/// Databases created before client search keys existed lack the column.
pub const ADD_SEARCH_KEY: &str = "ALTER TABLE clients ADD COLUMN search_key TEXT";

/// Sessions written before the status column existed are approved.
pub const MIGRATE_LEGACY_STATUS: &str =
    "UPDATE sessions SET status = 'approved' WHERE status IS NULL OR status = ''";

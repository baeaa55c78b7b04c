use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    if let Some(found) = get_schema_version(conn)? {
        if found > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }
    }

    // Descriptors are kept per student as a JSON array of arrays.
    // Attendance is unique per (student, scope regime, scope key); the
    // ledger relies on this for its conditional inserts.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS students (
            student_id       TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            department       TEXT NOT NULL,
            face_descriptors TEXT NOT NULL DEFAULT '[]',
            registered_on    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lectures (
            lecture_id  TEXT PRIMARY KEY,
            course_code TEXT NOT NULL,
            instructor  TEXT NOT NULL,
            room        TEXT NOT NULL,
            start_time  TEXT NOT NULL,
            end_time    TEXT,
            status      TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS attendance (
            id          TEXT PRIMARY KEY,
            student_id  TEXT NOT NULL,
            scope_kind  TEXT NOT NULL,
            scope_id    TEXT NOT NULL,
            date        TEXT NOT NULL,
            entry_time  TEXT NOT NULL,
            exit_time   TEXT,
            status      TEXT NOT NULL DEFAULT 'present',
            UNIQUE (student_id, scope_kind, scope_id)
        );

        CREATE INDEX IF NOT EXISTS idx_att_student ON attendance(student_id);
        CREATE INDEX IF NOT EXISTS idx_att_date ON attendance(date);
        CREATE INDEX IF NOT EXISTS idx_att_scope ON attendance(scope_kind, scope_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Stored schema version, or `None` for a database that was never initialized.
pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let stored: Option<String> = conn
        .query_row("SELECT value FROM metadata WHERE key = 'schema_version'", [], |row| row.get(0))
        .optional()?;
    stored
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| StoreError::InvalidData(format!("bad schema version: {v:?}")))
        })
        .transpose()
}

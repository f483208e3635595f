use rusqlite::Connection;

use crate::error::Result;

/// Initialise the sessions table and its indexes.
///
/// Safe to call on every startup; uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id               TEXT PRIMARY KEY,
            slot_id          TEXT,
            plate_number     TEXT,
            entry_time       TEXT NOT NULL,
            exit_time        TEXT,
            duration_minutes INTEGER,
            total_fee        REAL,
            status           TEXT NOT NULL DEFAULT 'active',
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_status_entry
            ON sessions(status, entry_time);
        CREATE INDEX IF NOT EXISTS idx_sessions_created
            ON sessions(created_at DESC);",
    )?;
    Ok(())
}

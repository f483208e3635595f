use rusqlite::Connection;

use crate::error::Result;

/// Create the slots table. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS slots (
            id          TEXT PRIMARY KEY,
            code        TEXT NOT NULL UNIQUE,
            zone        TEXT NOT NULL DEFAULT 'A',
            is_occupied INTEGER NOT NULL DEFAULT 0,
            position_x  INTEGER NOT NULL DEFAULT 0,
            position_y  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_slots_position
            ON slots(position_y, position_x);",
    )?;
    Ok(())
}

use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS captures (
            id          TEXT PRIMARY KEY,
            image_url   TEXT NOT NULL,
            camera_id   TEXT NOT NULL DEFAULT 'cam1',
            captured_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_captures_time
            ON captures(captured_at DESC);",
    )?;
    Ok(())
}

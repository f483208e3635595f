use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use parkwatch_core::types::{from_db_time, to_db_time};
use parkwatch_core::Capture;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{CaptureError, Result};

pub trait CaptureStore: Send + Sync {
    fn create(&self, capture: &Capture) -> Result<()>;
    fn latest(&self) -> Result<Option<Capture>>;
    /// Most recent first.
    fn list(&self, limit: usize) -> Result<Vec<Capture>>;
}

pub struct SqliteCaptureStore {
    db: Mutex<Connection>,
}

impl SqliteCaptureStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| CaptureError::Poisoned)
    }
}

impl CaptureStore for SqliteCaptureStore {
    #[instrument(skip(self, capture), fields(capture_id = %capture.id, camera_id = %capture.camera_id))]
    fn create(&self, capture: &Capture) -> Result<()> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO captures (id, image_url, camera_id, captured_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                capture.id.to_string(),
                capture.image_url,
                capture.camera_id,
                to_db_time(&capture.captured_at),
            ],
        )?;
        Ok(())
    }

    fn latest(&self) -> Result<Option<Capture>> {
        let db = self.conn()?;
        let capture = db
            .query_row(
                "SELECT id, image_url, camera_id, captured_at FROM captures
                 ORDER BY captured_at DESC, rowid DESC LIMIT 1",
                [],
                row_to_capture,
            )
            .optional()?;
        Ok(capture)
    }

    fn list(&self, limit: usize) -> Result<Vec<Capture>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT id, image_url, camera_id, captured_at FROM captures
             ORDER BY captured_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_capture)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_capture(row: &rusqlite::Row<'_>) -> rusqlite::Result<Capture> {
    let id: String = row.get(0)?;
    let captured_at: String = row.get(3)?;
    Ok(Capture {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        image_url: row.get(1)?,
        camera_id: row.get(2)?,
        captured_at: from_db_time(&captured_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
    })
}

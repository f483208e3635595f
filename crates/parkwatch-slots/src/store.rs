use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use parkwatch_core::config::SlotSeed;
use parkwatch_core::types::{from_db_time, to_db_time};
use parkwatch_core::{Slot, SlotStats};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, SlotError};

/// Durable slot table as seen by the rest of the system.
///
/// Reads always hit storage; nothing is cached in process.
pub trait SlotStore: Send + Sync {
    fn get_by_code(&self, code: &str) -> Result<Option<Slot>>;
    fn get_by_id(&self, id: Uuid) -> Result<Option<Slot>>;
    /// Overwrite the mutable columns of an existing slot. Last writer wins.
    fn save(&self, slot: &Slot) -> Result<()>;
    /// All slots ordered by grid row then column.
    fn list(&self) -> Result<Vec<Slot>>;
    fn stats(&self) -> Result<SlotStats>;
    /// Insert a slot unless one with the same code exists. Returns whether a
    /// row was created.
    fn provision(&self, seed: &SlotSeed, now: DateTime<Utc>) -> Result<bool>;
}

pub struct SqliteSlotStore {
    db: Mutex<Connection>,
}

const SELECT_COLUMNS: &str = "SELECT id, code, zone, is_occupied, position_x, position_y,
        created_at, updated_at FROM slots";

impl SqliteSlotStore {
    /// Wrap an open connection, creating the table if needed.
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
        self.db.lock().map_err(|_| SlotError::Poisoned)
    }

    fn query_one(&self, clause: &str, key: &str) -> Result<Option<Slot>> {
        let db = self.conn()?;
        let sql = format!("{SELECT_COLUMNS} WHERE {clause} = ?1");
        let slot = db.query_row(&sql, params![key], row_to_slot).optional()?;
        Ok(slot)
    }
}

impl SlotStore for SqliteSlotStore {
    #[instrument(skip(self))]
    fn get_by_code(&self, code: &str) -> Result<Option<Slot>> {
        self.query_one("code", code)
    }

    #[instrument(skip(self))]
    fn get_by_id(&self, id: Uuid) -> Result<Option<Slot>> {
        self.query_one("id", &id.to_string())
    }

    #[instrument(skip(self, slot), fields(slot = %slot.code, occupied = slot.is_occupied))]
    fn save(&self, slot: &Slot) -> Result<()> {
        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE slots
             SET zone = ?1, is_occupied = ?2, position_x = ?3, position_y = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                slot.zone,
                slot.is_occupied,
                slot.position_x,
                slot.position_y,
                to_db_time(&slot.updated_at),
                slot.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(SlotError::NotFound {
                id: slot.id.to_string(),
            });
        }
        debug!("slot saved");
        Ok(())
    }

    fn list(&self) -> Result<Vec<Slot>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY position_y, position_x, code"
        ))?;
        let rows = stmt.query_map([], row_to_slot)?;
        let slots = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(slots)
    }

    fn stats(&self) -> Result<SlotStats> {
        let db = self.conn()?;
        let (total, occupied): (i64, i64) = db.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_occupied), 0) FROM slots",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(SlotStats::from_counts(total as u32, occupied as u32))
    }

    #[instrument(skip(self, seed, now), fields(slot = %seed.code))]
    fn provision(&self, seed: &SlotSeed, now: DateTime<Utc>) -> Result<bool> {
        let db = self.conn()?;
        let ts = to_db_time(&now);
        let inserted = db.execute(
            "INSERT OR IGNORE INTO slots
             (id, code, zone, is_occupied, position_x, position_y, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)",
            params![
                Uuid::new_v4().to_string(),
                seed.code,
                seed.zone,
                seed.x,
                seed.y,
                ts
            ],
        )?;
        if inserted > 0 {
            info!("slot provisioned");
        }
        Ok(inserted > 0)
    }
}

fn row_to_slot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Slot> {
    Ok(Slot {
        id: parse_uuid(row, 0)?,
        code: row.get(1)?,
        zone: row.get(2)?,
        is_occupied: row.get(3)?,
        position_x: row.get(4)?,
        position_y: row.get(5)?,
        created_at: parse_time(row, 6)?,
        updated_at: parse_time(row, 7)?,
    })
}

fn parse_uuid(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_time(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    from_db_time(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

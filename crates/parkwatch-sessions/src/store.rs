use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use parkwatch_core::types::{from_db_time, to_db_time};
use parkwatch_core::{Session, SessionStats, SessionStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, SessionError};

/// Durable table of parking sessions.
pub trait SessionStore: Send + Sync {
    fn create(&self, session: &Session) -> Result<()>;

    /// The active session with the earliest entry time, ties broken by
    /// insertion order.
    fn find_oldest_active(&self) -> Result<Option<Session>>;

    /// Persist the `active -> completed` transition of `session`.
    ///
    /// Exit time, duration, fee and status are written in one statement that
    /// only matches a still-active row. Returns `false` when the session was
    /// already completed by someone else, in which case nothing is written.
    fn complete(&self, session: &Session) -> Result<bool>;

    fn get(&self, id: Uuid) -> Result<Option<Session>>;

    /// Newest first, optionally filtered by status.
    fn list(&self, status: Option<SessionStatus>, limit: usize) -> Result<Vec<Session>>;

    /// Counters, with "today" meaning rows created at or after `day_start`.
    fn stats(&self, day_start: DateTime<Utc>) -> Result<SessionStats>;
}

/// SQLite-backed [`SessionStore`].
///
/// Wraps a single connection in a `Mutex`; each method holds the lock for
/// exactly one statement or query.
pub struct SqliteSessionStore {
    db: Mutex<Connection>,
}

const SELECT_COLUMNS: &str = "SELECT id, slot_id, plate_number, entry_time, exit_time,
        duration_minutes, total_fee, status, created_at FROM sessions";

impl SqliteSessionStore {
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
        self.db.lock().map_err(|_| SessionError::Poisoned)
    }
}

impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    fn create(&self, session: &Session) -> Result<()> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO sessions
             (id, slot_id, plate_number, entry_time, exit_time, duration_minutes,
              total_fee, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session.id.to_string(),
                session.slot_id.map(|id| id.to_string()),
                session.plate_number,
                to_db_time(&session.entry_time),
                session.exit_time.as_ref().map(to_db_time),
                session.duration_minutes,
                session.total_fee,
                session.status.as_str(),
                to_db_time(&session.created_at),
            ],
        )?;
        debug!("session row inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    fn find_oldest_active(&self) -> Result<Option<Session>> {
        let db = self.conn()?;
        let session = db
            .query_row(
                &format!(
                    "{SELECT_COLUMNS} WHERE status = 'active'
                     ORDER BY entry_time ASC, rowid ASC LIMIT 1"
                ),
                [],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    fn complete(&self, session: &Session) -> Result<bool> {
        let (Some(exit_time), Some(duration), Some(fee)) =
            (session.exit_time, session.duration_minutes, session.total_fee)
        else {
            // Refuse to write a half-derived completion.
            return Ok(false);
        };

        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE sessions
             SET exit_time = ?1, duration_minutes = ?2, total_fee = ?3, status = 'completed'
             WHERE id = ?4 AND status = 'active'",
            params![
                to_db_time(&exit_time),
                duration,
                fee,
                session.id.to_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn get(&self, id: Uuid) -> Result<Option<Session>> {
        let db = self.conn()?;
        let session = db
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn list(&self, status: Option<SessionStatus>, limit: usize) -> Result<Vec<Session>> {
        let db = self.conn()?;
        let limit = limit as i64;
        let sessions = match status {
            Some(status) => {
                let mut stmt = db.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE status = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![status.as_str(), limit], row_to_session)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = db.prepare(&format!(
                    "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![limit], row_to_session)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(sessions)
    }

    fn stats(&self, day_start: DateTime<Utc>) -> Result<SessionStats> {
        let db = self.conn()?;
        let since = to_db_time(&day_start);
        let stats = db.query_row(
            "SELECT
                COALESCE(SUM(status = 'active'), 0),
                COALESCE(SUM(status = 'completed'), 0),
                COALESCE(SUM(created_at >= ?1), 0),
                COALESCE(SUM(CASE WHEN status = 'completed' AND created_at >= ?1
                                  THEN total_fee ELSE 0 END), 0.0)
             FROM sessions",
            params![since],
            |row| {
                Ok(SessionStats {
                    active_sessions: row.get::<_, i64>(0)? as u32,
                    completed_sessions: row.get::<_, i64>(1)? as u32,
                    today_sessions: row.get::<_, i64>(2)? as u32,
                    today_revenue: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }
}

/// Map a SQLite row to a `Session`.
fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let status: String = row.get(7)?;
    let status = status
        .parse::<SessionStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, e.into()))?;

    let slot_id = row
        .get::<_, Option<String>>(1)?
        .map(|raw| parse_uuid(&raw, 1))
        .transpose()?;
    let exit_time = row
        .get::<_, Option<String>>(4)?
        .map(|raw| parse_time(&raw, 4))
        .transpose()?;

    Ok(Session {
        id: parse_uuid(&row.get::<_, String>(0)?, 0)?,
        slot_id,
        plate_number: row.get(2)?,
        entry_time: parse_time(&row.get::<_, String>(3)?, 3)?,
        exit_time,
        duration_minutes: row.get(5)?,
        total_fee: row.get(6)?,
        status,
        created_at: parse_time(&row.get::<_, String>(8)?, 8)?,
    })
}

fn parse_uuid(raw: &str, idx: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_time(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    from_db_time(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

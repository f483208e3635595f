use chrono::{DateTime, Utc};
use parkwatch_core::{Capture, Session, Slot};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Server → viewer push event.
/// Wire: `{ "type": "slot_update", "data": { ...slot... } }`
///
/// Each variant carries its own concrete payload; the `type` tag is the only
/// discriminator viewers need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HubEvent {
    SlotUpdate(Slot),
    NewCapture(Capture),
    SessionEntry(SessionEntryPayload),
    SessionExit(SessionExitPayload),
}

/// Discriminant of [`HubEvent`], handy for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SlotUpdate,
    NewCapture,
    SessionEntry,
    SessionExit,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SlotUpdate => "slot_update",
            EventKind::NewCapture => "new_capture",
            EventKind::SessionEntry => "session_entry",
            EventKind::SessionExit => "session_exit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HubEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HubEvent::SlotUpdate(_) => EventKind::SlotUpdate,
            HubEvent::NewCapture(_) => EventKind::NewCapture,
            HubEvent::SessionEntry(_) => EventKind::SessionEntry,
            HubEvent::SessionExit(_) => EventKind::SessionExit,
        }
    }

    /// Serialize to the text frame sent over the socket.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn session_entry(session: &Session, camera_id: impl Into<String>) -> Self {
        HubEvent::SessionEntry(SessionEntryPayload {
            session_id: session.id,
            entry_time: session.entry_time,
            camera_id: camera_id.into(),
        })
    }

    /// Exit projection. Returns `None` for a session that has not completed,
    /// since the derived fields would be missing.
    pub fn session_exit(session: &Session, camera_id: impl Into<String>) -> Option<Self> {
        Some(HubEvent::SessionExit(SessionExitPayload {
            session_id: session.id,
            entry_time: session.entry_time,
            exit_time: session.exit_time?,
            duration_minutes: session.duration_minutes?,
            total_fee: session.total_fee?,
            camera_id: camera_id.into(),
        }))
    }
}

/// Minimal projection of a freshly opened session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntryPayload {
    pub session_id: Uuid,
    pub entry_time: DateTime<Utc>,
    pub camera_id: String,
}

/// Full derived payload of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExitPayload {
    pub session_id: Uuid,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub total_fee: f64,
    pub camera_id: String,
}

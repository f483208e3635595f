use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A physical parking slot.
///
/// `code` is the stable human identifier painted on the ground (e.g. `"A1"`)
/// and is what the classifier reports against. `is_occupied` is the only
/// source of truth for occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub code: String,
    pub zone: String,
    pub is_occupied: bool,
    pub position_x: i32,
    pub position_y: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate occupancy figures for the dashboard header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotStats {
    pub total: u32,
    pub occupied: u32,
    pub available: u32,
    /// Percentage in `0.0..=100.0`.
    pub occupancy_rate: f64,
}

impl SlotStats {
    pub fn from_counts(total: u32, occupied: u32) -> Self {
        let occupancy_rate = if total > 0 {
            f64::from(occupied) / f64::from(total) * 100.0
        } else {
            0.0
        };
        Self {
            total,
            occupied,
            available: total.saturating_sub(occupied),
            occupancy_rate,
        }
    }
}

/// Lifecycle state of a parking session. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// One vehicle stay, from entry to exit.
///
/// `exit_time`, `duration_minutes` and `total_fee` are `None` while the
/// session is active and are all set together when it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_number: Option<String>,
    pub entry_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_fee: Option<f64>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Session counters for the dashboard. "Today" is the current UTC day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub active_sessions: u32,
    pub completed_sessions: u32,
    pub today_sessions: u32,
    pub today_revenue: f64,
}

/// A stored camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub id: Uuid,
    pub image_url: String,
    pub camera_id: String,
    pub captured_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 (`...:SS.ffffffZ`) so stored timestamps sort
/// lexicographically in SQLite.
pub fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`to_db_time`] (any RFC 3339 offset is accepted).
pub fn from_db_time(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slot_stats_rate() {
        let stats = SlotStats::from_counts(8, 2);
        assert_eq!(stats.available, 6);
        assert!((stats.occupancy_rate - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn slot_stats_empty_lot_has_zero_rate() {
        let stats = SlotStats::from_counts(0, 0);
        assert_eq!(stats.occupancy_rate, 0.0);
    }

    #[test]
    fn active_session_omits_exit_fields() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let session = Session {
            id: Uuid::new_v4(),
            slot_id: None,
            plate_number: None,
            entry_time: t,
            exit_time: None,
            duration_minutes: None,
            total_fee: None,
            status: SessionStatus::Active,
            created_at: t,
        };
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains(r#""status":"active""#));
        assert!(!json.contains("exit_time"));
        assert!(!json.contains("total_fee"));
    }

    #[test]
    fn db_time_sorts_lexicographically() {
        let a = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        assert!(to_db_time(&a) < to_db_time(&b));
        assert_eq!(from_db_time(&to_db_time(&a)).unwrap(), a);
    }

    #[test]
    fn session_status_parse() {
        assert_eq!("completed".parse::<SessionStatus>(), Ok(SessionStatus::Completed));
        assert!("parked".parse::<SessionStatus>().is_err());
    }
}

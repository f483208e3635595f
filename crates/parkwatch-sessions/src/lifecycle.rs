use std::sync::Arc;

use chrono::{DateTime, Utc};
use parkwatch_core::{Clock, ParkError, Result, Session, SessionStats, SessionStatus};
use parkwatch_hub::HubHandle;
use parkwatch_protocol::HubEvent;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::billing::{billable_minutes, Tariff};
use crate::store::SessionStore;

/// Default page size for session listings.
pub const LIST_LIMIT: usize = 100;

/// Vehicle-entry signal from a gate camera.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryRequest {
    #[serde(default)]
    pub camera_id: String,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub plate_number: Option<String>,
    #[serde(default)]
    pub slot_id: Option<Uuid>,
}

/// Vehicle-exit signal from a gate camera.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExitRequest {
    #[serde(default)]
    pub camera_id: String,
    #[serde(default)]
    pub event_type: Option<String>,
}

/// Turns entry/exit signals into session rows and announces them.
///
/// A session moves `active -> completed` exactly once. Exit matches the
/// oldest active session, since entries carry no slot binding that would
/// disambiguate several parked vehicles.
#[derive(Clone)]
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    hub: HubHandle,
    clock: Arc<dyn Clock>,
    tariff: Tariff,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        hub: HubHandle,
        clock: Arc<dyn Clock>,
        tariff: Tariff,
    ) -> Self {
        Self {
            store,
            hub,
            clock,
            tariff,
        }
    }

    pub fn tariff(&self) -> Tariff {
        self.tariff
    }

    /// Open a new active session stamped with the current time. Only a
    /// store failure makes this fail; `camera_id` is echoed as sent.
    #[instrument(skip(self, req), fields(camera_id = %req.camera_id))]
    pub fn handle_entry(&self, req: EntryRequest) -> Result<Session> {
        let camera_id = req.camera_id.trim();
        let plate_number = req
            .plate_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let now = self.clock.now();
        let session = Session {
            id: Uuid::new_v4(),
            slot_id: req.slot_id,
            plate_number,
            entry_time: now,
            exit_time: None,
            duration_minutes: None,
            total_fee: None,
            status: SessionStatus::Active,
            created_at: now,
        };

        self.store.create(&session)?;
        info!(session_id = %session.id, "vehicle entry recorded");
        self.hub
            .broadcast(HubEvent::session_entry(&session, camera_id));
        Ok(session)
    }

    /// Close the oldest active session and bill it.
    ///
    /// Fails with `NotFound` when nothing is parked; nothing is written or
    /// broadcast in that case.
    #[instrument(skip(self, req), fields(camera_id = %req.camera_id))]
    pub fn handle_exit(&self, req: ExitRequest) -> Result<Session> {
        let camera_id = req.camera_id.trim();

        loop {
            let Some(active) = self.store.find_oldest_active()? else {
                return Err(ParkError::not_found("active session", "oldest"));
            };

            let completed = self.complete(active, self.clock.now());
            if !self.store.complete(&completed)? {
                // Another exit closed this one first; the next oldest is fair game.
                warn!(session_id = %completed.id, "session already completed, retrying exit match");
                continue;
            }

            info!(
                session_id = %completed.id,
                duration_minutes = completed.duration_minutes.unwrap_or_default(),
                total_fee = completed.total_fee.unwrap_or_default(),
                "vehicle exit recorded"
            );
            if let Some(event) = HubEvent::session_exit(&completed, camera_id) {
                self.hub.broadcast(event);
            }
            return Ok(completed);
        }
    }

    fn complete(&self, session: Session, exit_time: DateTime<Utc>) -> Session {
        let duration = billable_minutes(session.entry_time, exit_time);
        Session {
            exit_time: Some(exit_time),
            duration_minutes: Some(duration),
            total_fee: Some(self.tariff.fee(duration)),
            status: SessionStatus::Completed,
            ..session
        }
    }

    pub fn get(&self, id: Uuid) -> Result<Session> {
        self.store
            .get(id)?
            .ok_or_else(|| ParkError::not_found("session", id.to_string()))
    }

    pub fn list(&self, status: Option<SessionStatus>) -> Result<Vec<Session>> {
        Ok(self.store.list(status, LIST_LIMIT)?)
    }

    /// Counters where "today" starts at midnight UTC.
    pub fn stats(&self) -> Result<SessionStats> {
        let day_start = self
            .clock
            .now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| ParkError::Internal("cannot compute start of day".into()))?;
        Ok(self.store.stats(day_start)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::store::SqliteSessionStore;
    use chrono::{Duration, TimeZone};
    use parkwatch_core::ManualClock;
    use parkwatch_hub::{BroadcastHub, Subscription};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        controller: SessionController,
        store: Arc<SqliteSessionStore>,
        clock: Arc<ManualClock>,
        hub: HubHandle,
        sub: Subscription,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 12, 7, 45, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteSessionStore::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(start()));
        let hub = BroadcastHub::spawn(16);
        let sub = hub.register();
        let controller =
            SessionController::new(store.clone(), hub.clone(), clock.clone(), Tariff::default());
        Fixture {
            controller,
            store,
            clock,
            hub,
            sub,
        }
    }

    fn entry(camera: &str) -> EntryRequest {
        EntryRequest {
            camera_id: camera.into(),
            ..Default::default()
        }
    }

    fn exit(camera: &str) -> ExitRequest {
        ExitRequest {
            camera_id: camera.into(),
            event_type: Some("exit".into()),
        }
    }

    #[tokio::test]
    async fn forty_minute_stay_bills_minimum_hour() {
        let mut f = fixture();
        let opened = f.controller.handle_entry(entry("gate-in")).unwrap();
        assert!(opened.is_active());
        assert_eq!(opened.entry_time, start());

        f.clock.advance(Duration::minutes(40));
        let closed = f.controller.handle_exit(exit("gate-out")).unwrap();

        assert_eq!(closed.id, opened.id);
        assert_eq!(closed.status, SessionStatus::Completed);
        assert_eq!(closed.duration_minutes, Some(40));
        assert_eq!(closed.total_fee, Some(2000.0));
        assert_eq!(closed.exit_time, Some(start() + Duration::minutes(40)));

        match &*f.sub.recv().await.unwrap() {
            HubEvent::SessionEntry(p) => {
                assert_eq!(p.session_id, opened.id);
                assert_eq!(p.camera_id, "gate-in");
            }
            other => panic!("expected session_entry, got {other:?}"),
        }
        match &*f.sub.recv().await.unwrap() {
            HubEvent::SessionExit(p) => {
                assert_eq!(p.duration_minutes, 40);
                assert_eq!(p.total_fee, 2000.0);
                assert_eq!(p.camera_id, "gate-out");
            }
            other => panic!("expected session_exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn long_stay_billed_pro_rata() {
        let f = fixture();
        f.controller.handle_entry(entry("gate-in")).unwrap();
        f.clock.advance(Duration::minutes(150));

        let closed = f.controller.handle_exit(exit("gate-out")).unwrap();
        assert_eq!(closed.duration_minutes, Some(150));
        assert_eq!(closed.total_fee, Some(5000.0));

        let stored = f.store.get(closed.id).unwrap().unwrap();
        assert_eq!(stored, closed);
    }

    #[tokio::test]
    async fn exit_without_active_session_is_not_found() {
        let mut f = fixture();

        let err = f.controller.handle_exit(exit("gate-out")).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        assert!(f.store.list(None, 10).unwrap().is_empty());
        f.hub.stats().await.unwrap();
        assert!(f.sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn exits_close_sessions_in_entry_order() {
        let f = fixture();
        let first = f.controller.handle_entry(entry("gate-in")).unwrap();
        f.clock.advance(Duration::minutes(5));
        let second = f.controller.handle_entry(entry("gate-in")).unwrap();
        f.clock.advance(Duration::minutes(60));

        let closed = f.controller.handle_exit(exit("gate-out")).unwrap();
        assert_eq!(closed.id, first.id);
        assert_eq!(closed.duration_minutes, Some(65));

        let closed = f.controller.handle_exit(exit("gate-out")).unwrap();
        assert_eq!(closed.id, second.id);
        assert_eq!(closed.duration_minutes, Some(60));

        assert!(f.controller.handle_exit(exit("gate-out")).is_err());
    }

    #[tokio::test]
    async fn camera_id_is_optional() {
        let mut f = fixture();

        let req: EntryRequest = serde_json::from_str(r#"{"event_type":"entry"}"#).unwrap();
        let opened = f.controller.handle_entry(req).unwrap();
        assert!(opened.is_active());

        f.clock.advance(Duration::minutes(10));
        let req: ExitRequest = serde_json::from_str(r#"{"camera_id":""}"#).unwrap();
        let closed = f.controller.handle_exit(req).unwrap();
        assert_eq!(closed.id, opened.id);
        assert_eq!(closed.total_fee, Some(2000.0));

        match &*f.sub.recv().await.unwrap() {
            HubEvent::SessionEntry(p) => assert_eq!(p.camera_id, ""),
            other => panic!("expected session_entry, got {other:?}"),
        }
        match &*f.sub.recv().await.unwrap() {
            HubEvent::SessionExit(p) => assert_eq!(p.camera_id, ""),
            other => panic!("expected session_exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn entry_keeps_optional_plate_and_slot() {
        let f = fixture();
        let slot_id = Uuid::new_v4();
        let session = f
            .controller
            .handle_entry(EntryRequest {
                camera_id: "gate-in".into(),
                plate_number: Some(" B 1234 XY ".into()),
                slot_id: Some(slot_id),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(session.plate_number.as_deref(), Some("B 1234 XY"));
        assert_eq!(session.slot_id, Some(slot_id));
        assert_eq!(f.controller.get(session.id).unwrap(), session);
    }

    #[tokio::test]
    async fn stats_count_today() {
        let f = fixture();
        f.controller.handle_entry(entry("gate-in")).unwrap();
        f.controller.handle_entry(entry("gate-in")).unwrap();
        f.clock.advance(Duration::minutes(90));
        f.controller.handle_exit(exit("gate-out")).unwrap();

        let stats = f.controller.stats().unwrap();
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.today_sessions, 2);
        assert_eq!(stats.today_revenue, 3000.0);

        assert_eq!(f.controller.list(Some(SessionStatus::Active)).unwrap().len(), 1);
    }

    /// Store whose first `complete` loses to a concurrent exit.
    struct RacingStore {
        inner: SqliteSessionStore,
        raced: AtomicBool,
    }

    impl SessionStore for RacingStore {
        fn create(&self, session: &Session) -> crate::error::Result<()> {
            self.inner.create(session)
        }
        fn find_oldest_active(&self) -> crate::error::Result<Option<Session>> {
            self.inner.find_oldest_active()
        }
        fn complete(&self, session: &Session) -> crate::error::Result<bool> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                assert!(self.inner.complete(session)?);
                return Ok(false);
            }
            self.inner.complete(session)
        }
        fn get(&self, id: Uuid) -> crate::error::Result<Option<Session>> {
            self.inner.get(id)
        }
        fn list(
            &self,
            status: Option<SessionStatus>,
            limit: usize,
        ) -> crate::error::Result<Vec<Session>> {
            self.inner.list(status, limit)
        }
        fn stats(&self, day_start: DateTime<Utc>) -> crate::error::Result<SessionStats> {
            self.inner.stats(day_start)
        }
    }

    #[tokio::test]
    async fn lost_exit_race_moves_to_next_oldest() {
        let store = Arc::new(RacingStore {
            inner: SqliteSessionStore::open_in_memory().unwrap(),
            raced: AtomicBool::new(false),
        });
        let clock = Arc::new(ManualClock::new(start()));
        let hub = BroadcastHub::spawn(16);
        let controller =
            SessionController::new(store.clone(), hub.clone(), clock.clone(), Tariff::default());

        let first = controller.handle_entry(entry("gate-in")).unwrap();
        clock.advance(Duration::minutes(1));
        let second = controller.handle_entry(entry("gate-in")).unwrap();
        clock.advance(Duration::minutes(30));

        let closed = controller.handle_exit(exit("gate-out")).unwrap();
        assert_eq!(closed.id, second.id);
        assert!(!store.get(first.id).unwrap().unwrap().is_active());
    }

    struct BrokenStore;

    impl SessionStore for BrokenStore {
        fn create(&self, _: &Session) -> crate::error::Result<()> {
            Err(SessionError::Poisoned)
        }
        fn find_oldest_active(&self) -> crate::error::Result<Option<Session>> {
            Err(SessionError::Poisoned)
        }
        fn complete(&self, _: &Session) -> crate::error::Result<bool> {
            Err(SessionError::Poisoned)
        }
        fn get(&self, _: Uuid) -> crate::error::Result<Option<Session>> {
            Err(SessionError::Poisoned)
        }
        fn list(&self, _: Option<SessionStatus>, _: usize) -> crate::error::Result<Vec<Session>> {
            Err(SessionError::Poisoned)
        }
        fn stats(&self, _: DateTime<Utc>) -> crate::error::Result<SessionStats> {
            Err(SessionError::Poisoned)
        }
    }

    #[tokio::test]
    async fn store_failure_is_reported_and_not_broadcast() {
        let hub = BroadcastHub::spawn(16);
        let mut sub = hub.register();
        let controller = SessionController::new(
            Arc::new(BrokenStore),
            hub.clone(),
            Arc::new(ManualClock::new(start())),
            Tariff::default(),
        );

        assert_eq!(
            controller.handle_entry(entry("gate-in")).unwrap_err().code(),
            "STORE_ERROR"
        );
        assert_eq!(
            controller.handle_exit(exit("gate-out")).unwrap_err().code(),
            "STORE_ERROR"
        );

        hub.stats().await.unwrap();
        assert!(sub.try_recv().is_none());
    }
}

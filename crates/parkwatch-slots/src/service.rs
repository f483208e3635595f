use std::sync::Arc;

use parkwatch_core::{Clock, ParkError, Result, Slot, SlotStats};
use parkwatch_hub::HubHandle;
use parkwatch_protocol::HubEvent;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::store::SlotStore;

/// Body of a manual slot update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotUpdate {
    #[serde(default)]
    pub is_occupied: Option<bool>,
}

/// Request-scoped slot reads and manual mutations.
///
/// Every mutation is read, modify, persist, then `slot_update`. A failed
/// persist returns the error and broadcasts nothing.
#[derive(Clone)]
pub struct SlotService {
    store: Arc<dyn SlotStore>,
    hub: HubHandle,
    clock: Arc<dyn Clock>,
}

impl SlotService {
    pub fn new(store: Arc<dyn SlotStore>, hub: HubHandle, clock: Arc<dyn Clock>) -> Self {
        Self { store, hub, clock }
    }

    pub fn list(&self) -> Result<Vec<Slot>> {
        Ok(self.store.list()?)
    }

    pub fn stats(&self) -> Result<SlotStats> {
        Ok(self.store.stats()?)
    }

    pub fn get(&self, id: Uuid) -> Result<Slot> {
        self.store
            .get_by_id(id)?
            .ok_or_else(|| ParkError::not_found("slot", id.to_string()))
    }

    /// Flip `is_occupied` whatever its current value.
    #[instrument(skip(self))]
    pub fn toggle(&self, id: Uuid) -> Result<Slot> {
        let mut slot = self.get(id)?;
        slot.is_occupied = !slot.is_occupied;
        self.commit(slot)
    }

    /// Apply `update` to the slot. An empty update still persists and
    /// announces the slot.
    #[instrument(skip(self))]
    pub fn update(&self, id: Uuid, update: SlotUpdate) -> Result<Slot> {
        let mut slot = self.get(id)?;
        if let Some(occupied) = update.is_occupied {
            slot.is_occupied = occupied;
        }
        self.commit(slot)
    }

    fn commit(&self, mut slot: Slot) -> Result<Slot> {
        slot.updated_at = self.clock.now();
        self.store.save(&slot)?;
        info!(slot = %slot.code, occupied = slot.is_occupied, "slot updated manually");
        self.hub.broadcast(HubEvent::SlotUpdate(slot.clone()));
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlotError;
    use crate::store::SqliteSlotStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use parkwatch_core::config::SlotSeed;
    use parkwatch_core::ManualClock;
    use parkwatch_hub::{BroadcastHub, Subscription};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
    }

    fn setup() -> (SlotService, Arc<SqliteSlotStore>, Subscription, HubHandle, Arc<ManualClock>) {
        let store = Arc::new(SqliteSlotStore::open_in_memory().unwrap());
        store
            .provision(
                &SlotSeed {
                    code: "A1".into(),
                    zone: "A".into(),
                    x: 0,
                    y: 0,
                },
                start(),
            )
            .unwrap();
        let hub = BroadcastHub::spawn(16);
        let sub = hub.register();
        let clock = Arc::new(ManualClock::new(start()));
        let service = SlotService::new(store.clone(), hub.clone(), clock.clone());
        (service, store, sub, hub, clock)
    }

    fn expect_slot_update(ev: &HubEvent) -> &Slot {
        match ev {
            HubEvent::SlotUpdate(slot) => slot,
            other => panic!("expected slot_update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn toggle_flips_and_emits_once() {
        let (service, store, mut sub, hub, clock) = setup();
        let id = store.get_by_code("A1").unwrap().unwrap().id;

        clock.advance(Duration::minutes(3));
        let slot = service.toggle(id).unwrap();
        assert!(slot.is_occupied);
        assert_eq!(slot.updated_at, start() + Duration::minutes(3));

        let slot = service.toggle(id).unwrap();
        assert!(!slot.is_occupied);

        hub.stats().await.unwrap();
        assert!(expect_slot_update(&sub.recv().await.unwrap()).is_occupied);
        assert!(!expect_slot_update(&sub.recv().await.unwrap()).is_occupied);
        assert!(sub.try_recv().is_none());
        assert!(!store.get_by_id(id).unwrap().unwrap().is_occupied);
    }

    #[tokio::test]
    async fn explicit_update_sets_value() {
        let (service, store, mut sub, _hub, _clock) = setup();
        let id = store.get_by_code("A1").unwrap().unwrap().id;

        let slot = service
            .update(id, SlotUpdate { is_occupied: Some(true) })
            .unwrap();
        assert!(slot.is_occupied);
        // Setting the same value again is still persisted and announced.
        service
            .update(id, SlotUpdate { is_occupied: Some(true) })
            .unwrap();

        assert_eq!(expect_slot_update(&sub.recv().await.unwrap()).code, "A1");
        assert_eq!(expect_slot_update(&sub.recv().await.unwrap()).code, "A1");
    }

    #[tokio::test]
    async fn empty_update_keeps_occupancy() {
        let (service, store, mut sub, _hub, _clock) = setup();
        let id = store.get_by_code("A1").unwrap().unwrap().id;

        let slot = service.update(id, SlotUpdate::default()).unwrap();
        assert!(!slot.is_occupied);
        assert!(!expect_slot_update(&sub.recv().await.unwrap()).is_occupied);
    }

    #[tokio::test]
    async fn unknown_slot_is_not_found_and_silent() {
        let (service, _store, mut sub, hub, _clock) = setup();

        let err = service.toggle(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        hub.stats().await.unwrap();
        assert!(sub.try_recv().is_none());
    }

    struct ReadOnlyStore(SqliteSlotStore);

    impl SlotStore for ReadOnlyStore {
        fn get_by_code(&self, code: &str) -> crate::error::Result<Option<Slot>> {
            self.0.get_by_code(code)
        }
        fn get_by_id(&self, id: Uuid) -> crate::error::Result<Option<Slot>> {
            self.0.get_by_id(id)
        }
        fn save(&self, _slot: &Slot) -> crate::error::Result<()> {
            Err(SlotError::Poisoned)
        }
        fn list(&self) -> crate::error::Result<Vec<Slot>> {
            self.0.list()
        }
        fn stats(&self) -> crate::error::Result<SlotStats> {
            self.0.stats()
        }
        fn provision(&self, seed: &SlotSeed, now: DateTime<Utc>) -> crate::error::Result<bool> {
            self.0.provision(seed, now)
        }
    }

    #[tokio::test]
    async fn failed_save_broadcasts_nothing() {
        let inner = SqliteSlotStore::open_in_memory().unwrap();
        let seed = SlotSeed {
            code: "A1".into(),
            zone: "A".into(),
            x: 0,
            y: 0,
        };
        inner.provision(&seed, start()).unwrap();
        let id = inner.get_by_code("A1").unwrap().unwrap().id;

        let hub = BroadcastHub::spawn(16);
        let mut sub = hub.register();
        let service = SlotService::new(
            Arc::new(ReadOnlyStore(inner)),
            hub.clone(),
            Arc::new(ManualClock::new(start())),
        );

        let err = service.toggle(id).unwrap_err();
        assert_eq!(err.code(), "STORE_ERROR");

        hub.stats().await.unwrap();
        assert!(sub.try_recv().is_none());
    }
}

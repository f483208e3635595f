use std::sync::Arc;

use parkwatch_core::Clock;
use parkwatch_hub::HubHandle;
use parkwatch_protocol::HubEvent;
use parkwatch_slots::SlotStore;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::types::{Classification, Detection};

/// Outcome of applying one classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Codes whose occupancy changed and were announced.
    pub updated: Vec<String>,
    pub unchanged: usize,
    /// Codes with no matching slot.
    pub unknown: Vec<String>,
    /// Codes whose read or write failed.
    pub failed: Vec<String>,
}

/// Applies classifier output to the slot store as deltas.
pub struct DetectionReconciler {
    slots: Arc<dyn SlotStore>,
    hub: HubHandle,
    clock: Arc<dyn Clock>,
}

impl DetectionReconciler {
    pub fn new(slots: Arc<dyn SlotStore>, hub: HubHandle, clock: Arc<dyn Clock>) -> Self {
        Self { slots, hub, clock }
    }

    /// Write every reported slot whose stored occupancy differs, emitting one
    /// `slot_update` per write. Unknown codes and per-slot store failures are
    /// skipped without affecting the rest of the batch.
    #[instrument(skip(self, classification), fields(slots = classification.slot_status.len()))]
    pub fn reconcile(&self, classification: &Classification) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for (code, &observed) in &classification.slot_status {
            let mut slot = match self.slots.get_by_code(code) {
                Ok(Some(slot)) => slot,
                Ok(None) => {
                    debug!(slot = %code, "classifier reported unknown slot");
                    report.unknown.push(code.clone());
                    continue;
                }
                Err(e) => {
                    error!(slot = %code, error = %e, "slot lookup failed");
                    report.failed.push(code.clone());
                    continue;
                }
            };

            if slot.is_occupied == observed {
                report.unchanged += 1;
                continue;
            }

            slot.is_occupied = observed;
            slot.updated_at = self.clock.now();
            if let Err(e) = self.slots.save(&slot) {
                error!(slot = %code, error = %e, "slot write failed");
                report.failed.push(code.clone());
                continue;
            }

            info!(slot = %code, occupied = observed, "slot occupancy detected");
            self.hub.broadcast(HubEvent::SlotUpdate(slot));
            report.updated.push(code.clone());
        }

        report
    }

    /// Drain detections until every dispatcher is gone.
    pub async fn run(self, mut rx: mpsc::Receiver<Detection>) {
        info!("detection reconciler started");
        while let Some(detection) = rx.recv().await {
            let report = self.reconcile(&detection.classification);
            debug!(
                capture_id = %detection.capture_id,
                updated = report.updated.len(),
                unchanged = report.unchanged,
                unknown = report.unknown.len(),
                failed = report.failed.len(),
                "detection reconciled"
            );
        }
        info!("detection reconciler stopped");
    }
}

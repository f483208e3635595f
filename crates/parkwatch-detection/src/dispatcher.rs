use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::Classifier;
use crate::types::{Detection, Frame};

/// Runs classification off the request path.
///
/// Each [`dispatch`](Self::dispatch) spawns one task. A successful result is
/// sent to the reconciler's channel; a failure is logged and dropped without
/// retry. The caller never waits on either outcome.
#[derive(Clone)]
pub struct DetectionDispatcher {
    classifier: Arc<dyn Classifier>,
    tx: mpsc::Sender<Detection>,
}

impl DetectionDispatcher {
    /// Create a dispatcher and the receiving end its results arrive on.
    pub fn new(classifier: Arc<dyn Classifier>, buffer: usize) -> (Self, mpsc::Receiver<Detection>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { classifier, tx }, rx)
    }

    pub fn dispatch(&self, capture_id: Uuid, frame: Frame) -> JoinHandle<()> {
        let classifier = Arc::clone(&self.classifier);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            debug!(%capture_id, classifier = classifier.name(), "classifying capture");
            let classification = match classifier.classify(&frame).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(%capture_id, error = %e, "classification failed");
                    return;
                }
            };

            info!(
                %capture_id,
                vehicles = classification.vehicles_detected,
                slots = classification.slot_status.len(),
                "classification received"
            );
            if tx
                .send(Detection {
                    capture_id,
                    classification,
                })
                .await
                .is_err()
            {
                warn!(%capture_id, "reconciler stopped, detection discarded");
            }
        })
    }
}

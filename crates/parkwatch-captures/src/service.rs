use std::sync::Arc;

use parkwatch_core::config::DEFAULT_CAMERA_ID;
use parkwatch_core::{Capture, Clock, ParkError, Result};
use parkwatch_detection::{DetectionDispatcher, Frame};
use parkwatch_hub::HubHandle;
use parkwatch_protocol::HubEvent;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::storage::{object_key, ImageStore};
use crate::store::CaptureStore;

/// Number of captures returned by [`CaptureService::list`].
pub const LIST_LIMIT: usize = 50;

/// One uploaded frame as received from a camera or the dashboard.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// `None` when the request carried no image part at all.
    pub data: Option<Vec<u8>>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub camera_id: Option<String>,
}

/// Ingests captures: store the image, record it, announce it, then hand it
/// to detection without waiting for the result.
#[derive(Clone)]
pub struct CaptureService {
    store: Arc<dyn CaptureStore>,
    images: Arc<dyn ImageStore>,
    hub: HubHandle,
    clock: Arc<dyn Clock>,
    detection: Option<DetectionDispatcher>,
}

impl CaptureService {
    pub fn new(
        store: Arc<dyn CaptureStore>,
        images: Arc<dyn ImageStore>,
        hub: HubHandle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            images,
            hub,
            clock,
            detection: None,
        }
    }

    /// Classify every ingested capture through `dispatcher`.
    pub fn with_detection(mut self, dispatcher: DetectionDispatcher) -> Self {
        self.detection = Some(dispatcher);
        self
    }

    /// Succeeds as soon as the capture is stored. Classification outcome
    /// never affects the result.
    #[instrument(skip(self, upload), fields(bytes = upload.data.as_ref().map_or(0, Vec::len)))]
    pub async fn ingest(&self, upload: Upload) -> Result<Capture> {
        let Some(data) = upload.data else {
            return Err(ParkError::Validation("No image file provided".into()));
        };

        let camera_id = upload
            .camera_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CAMERA_ID.to_string());
        let filename = upload.filename.unwrap_or_else(|| "capture.jpg".to_string());
        let content_type = upload
            .content_type
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "image/jpeg".to_string());

        let now = self.clock.now();
        let key = object_key(now, &camera_id, &filename);
        let image_url = self.images.put(&key, &data, &content_type).await?;

        let capture = Capture {
            id: Uuid::new_v4(),
            image_url,
            camera_id,
            captured_at: now,
        };
        self.store.create(&capture)?;
        info!(capture_id = %capture.id, camera_id = %capture.camera_id, "capture stored");

        self.hub.broadcast(HubEvent::NewCapture(capture.clone()));

        if let Some(dispatcher) = &self.detection {
            dispatcher.dispatch(
                capture.id,
                Frame {
                    data,
                    filename,
                    content_type,
                },
            );
        }

        Ok(capture)
    }

    pub fn latest(&self) -> Result<Capture> {
        self.store
            .latest()?
            .ok_or_else(|| ParkError::not_found("capture", "latest"))
    }

    pub fn list(&self) -> Result<Vec<Capture>> {
        Ok(self.store.list(LIST_LIMIT)?)
    }
}

use axum::{
    extract::{Multipart, State},
    Json,
};
use parkwatch_captures::Upload;
use parkwatch_core::Capture;
use parkwatch_protocol::ApiEnvelope;
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use crate::app::AppState;

/// POST /api/capture (multipart: `image` file, optional `camera_id`).
///
/// Responds once the frame is stored; classification runs afterwards.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiEnvelope<Capture>>> {
    let mut upload = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("image") => {
                upload.filename = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read image file: {e}")))?;
                upload.data = Some(data.to_vec());
            }
            Some("camera_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid camera_id: {e}")))?;
                upload.camera_id = Some(text);
            }
            _ => {}
        }
    }

    let capture = state.captures.ingest(upload).await?;
    Ok(Json(ApiEnvelope::ok(capture)))
}

/// GET /api/capture/latest
pub async fn latest(State(state): State<Arc<AppState>>) -> ApiResult<Json<ApiEnvelope<Capture>>> {
    Ok(Json(ApiEnvelope::ok(state.captures.latest()?)))
}

/// GET /api/captures, most recent 50.
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<Vec<Capture>>>> {
    let captures = state.captures.list()?;
    let total = captures.len();
    Ok(Json(ApiEnvelope::ok(captures).with_total(total)))
}

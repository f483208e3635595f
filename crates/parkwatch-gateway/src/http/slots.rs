use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use parkwatch_core::{Slot, SlotStats};
use parkwatch_protocol::ApiEnvelope;
use parkwatch_slots::SlotUpdate;
use std::sync::Arc;

use super::error::{parse_id, ApiError, ApiResult};
use crate::app::AppState;

/// GET /api/slots, ordered by grid position.
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<ApiEnvelope<Vec<Slot>>>> {
    let slots = state.slots.list()?;
    let total = slots.len();
    Ok(Json(ApiEnvelope::ok(slots).with_total(total)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Slot>>> {
    let id = parse_id("slot", &id)?;
    Ok(Json(ApiEnvelope::ok(state.slots.get(id)?)))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<ApiEnvelope<SlotStats>>> {
    Ok(Json(ApiEnvelope::ok(state.slots.stats()?)))
}

/// PUT /api/slots/{id} with `{"is_occupied": bool}`.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<SlotUpdate>, JsonRejection>,
) -> ApiResult<Json<ApiEnvelope<Slot>>> {
    let id = parse_id("slot", &id)?;
    let Json(update) = body.map_err(|_| ApiError::bad_request("Invalid request body"))?;
    Ok(Json(ApiEnvelope::ok(state.slots.update(id, update)?)))
}

/// POST /api/slots/{id}/toggle
pub async fn toggle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Slot>>> {
    let id = parse_id("slot", &id)?;
    Ok(Json(ApiEnvelope::ok(state.slots.toggle(id)?)))
}

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use parkwatch_core::{ParkError, Session, SessionStats, SessionStatus};
use parkwatch_protocol::ApiEnvelope;
use parkwatch_sessions::{EntryRequest, ExitRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::error::{parse_id, ApiError, ApiResult};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// POST /api/sessions/entry, sent by the entry gate camera.
pub async fn entry(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EntryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiEnvelope<Session>>)> {
    let Json(req) = body.map_err(|_| ApiError::bad_request("Invalid request body"))?;
    debug!(event_type = ?req.event_type, "entry event");
    let session = state.sessions.handle_entry(req)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiEnvelope::ok(session).with_message("Entry recorded")),
    ))
}

/// POST /api/sessions/exit
pub async fn exit(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ExitRequest>, JsonRejection>,
) -> ApiResult<Json<ApiEnvelope<Session>>> {
    let Json(req) = body.map_err(|_| ApiError::bad_request("Invalid request body"))?;
    debug!(event_type = ?req.event_type, "exit event");
    let session = state.sessions.handle_exit(req)?;
    Ok(Json(ApiEnvelope::ok(session).with_message("Exit recorded")))
}

/// GET /api/sessions?status=active|completed
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<Session>>>> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<SessionStatus>().map_err(ParkError::Validation)?),
        None => None,
    };
    let sessions = state.sessions.list(status)?;
    let total = sessions.len();
    Ok(Json(ApiEnvelope::ok(sessions).with_total(total)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Session>>> {
    let id = parse_id("session", &id)?;
    Ok(Json(ApiEnvelope::ok(state.sessions.get(id)?)))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<SessionStats>>> {
    Ok(Json(ApiEnvelope::ok(state.sessions.stats()?)))
}

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check with the live subscriber count.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let subscribers = match state.hub.stats().await {
        Ok(stats) => stats.subscribers,
        Err(_) => 0,
    };
    Json(json!({
        "status": if state.hub.is_running() { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": subscribers,
    }))
}

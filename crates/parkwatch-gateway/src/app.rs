use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use parkwatch_captures::CaptureService;
use parkwatch_core::config::MAX_UPLOAD_BYTES;
use parkwatch_core::ParkwatchConfig;
use parkwatch_hub::HubHandle;
use parkwatch_sessions::SessionController;
use parkwatch_slots::SlotService;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::http::{captures, health, sessions, slots};
use crate::ws::connection;

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: ParkwatchConfig,
    pub hub: HubHandle,
    pub slots: SlotService,
    pub sessions: SessionController,
    pub captures: CaptureService,
}

impl AppState {
    pub fn new(
        config: ParkwatchConfig,
        hub: HubHandle,
        slots: SlotService,
        sessions: SessionController,
        captures: CaptureService,
    ) -> Self {
        Self {
            config,
            hub,
            slots,
            sessions,
            captures,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let media = ServeDir::new(&state.config.storage.dir);
    let media_prefix = state
        .config
        .storage
        .public_prefix
        .trim_end_matches('/')
        .to_string();

    let api = Router::new()
        .route("/slots", get(slots::list))
        .route("/slots/stats", get(slots::stats))
        .route("/slots/{id}", get(slots::get).put(slots::update))
        .route("/slots/{id}/toggle", post(slots::toggle))
        .route("/sessions", get(sessions::list))
        .route("/sessions/stats", get(sessions::stats))
        .route("/sessions/entry", post(sessions::entry))
        .route("/sessions/exit", post(sessions::exit))
        .route("/sessions/{id}", get(sessions::get))
        .route(
            "/capture",
            post(captures::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/capture/latest", get(captures::latest))
        .route("/captures", get(captures::list));

    let router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/ws", get(connection::ws_handler))
        .nest("/api", api);
    // Stored frames are served at the prefix the image store writes into URLs.
    let router = if media_prefix.is_empty() {
        router.fallback_service(media)
    } else {
        router.nest_service(&media_prefix, media)
    };

    router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use parkwatch_captures::{CaptureService, LocalImageStore, SqliteCaptureStore};
use parkwatch_core::{Clock, ParkwatchConfig, SystemClock};
use parkwatch_detection::{DetectionDispatcher, DetectionReconciler, HttpClassifier};
use parkwatch_hub::BroadcastHub;
use parkwatch_sessions::{SessionController, SqliteSessionStore, Tariff};
use parkwatch_slots::{SlotService, SlotStore, SqliteSlotStore};
use tracing::{info, warn};

mod app;
mod http;
mod ws;

#[derive(Debug, Parser)]
#[command(name = "parkwatch-gateway", version, about = "Parking occupancy gateway")]
struct Cli {
    /// Path to parkwatch.toml (defaults to ~/.parkwatch/parkwatch.toml).
    #[arg(long, env = "PARKWATCH_CONFIG")]
    config: Option<String>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parkwatch_gateway=info,parkwatch_hub=info,parkwatch_detection=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ParkwatchConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        ParkwatchConfig::default()
    });
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // one SQLite file; each store gets its own connection
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path)?;
    info!(path = %db_path, "opening SQLite database");
    let slot_store = Arc::new(SqliteSlotStore::open(&db_path)?);
    let session_store = Arc::new(SqliteSessionStore::open(&db_path)?);
    let capture_store = Arc::new(SqliteCaptureStore::open(&db_path)?);
    info!("database migrations complete");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut provisioned = 0;
    for seed in &config.slots.seed {
        if slot_store.provision(seed, clock.now())? {
            provisioned += 1;
        }
    }
    if provisioned > 0 {
        info!(count = provisioned, "slots provisioned from config");
    }

    let hub = BroadcastHub::spawn(config.hub.subscriber_queue);

    std::fs::create_dir_all(&config.storage.dir)?;
    let images = Arc::new(LocalImageStore::new(
        &config.storage.dir,
        &config.storage.public_prefix,
    ));
    let mut captures = CaptureService::new(capture_store, images, hub.clone(), clock.clone());

    if config.classifier.enabled {
        let classifier = Arc::new(HttpClassifier::new(&config.classifier)?);
        info!(endpoint = %classifier.endpoint(), "classifier enabled");
        let (dispatcher, detections) =
            DetectionDispatcher::new(classifier, config.hub.detection_buffer);
        let reconciler = DetectionReconciler::new(slot_store.clone(), hub.clone(), clock.clone());
        tokio::spawn(reconciler.run(detections));
        captures = captures.with_detection(dispatcher);
    } else {
        info!("classifier disabled, captures will not be analysed");
    }

    let slots = SlotService::new(slot_store, hub.clone(), clock.clone());
    let sessions = SessionController::new(
        session_store,
        hub.clone(),
        clock,
        Tariff::from(&config.billing),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(config, hub, slots, sessions, captures));
    let router = app::build_router(state);

    info!("Parkwatch gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Parkwatch gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn ensure_parent_dir(path: &str) -> std::io::Result<()> {
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

//! One live viewer on `GET /ws`.
//!
//! Each connection runs two halves concurrently: an inbound watch that only
//! looks for close, transport errors and oversized frames, and an outbound
//! drain that writes queued hub events (plus periodic pings) in order. They
//! share a [`CancellationToken`]; whichever half ends first cancels the
//! other, and the subscriber is unregistered once both have stopped.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parkwatch_core::config::{HEARTBEAT_INTERVAL_SECS, MAX_INBOUND_BYTES};
use parkwatch_hub::{HubHandle, Subscription};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::AppState;

/// Upper bound on the close handshake once a connection is torn down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    /// Client sent a close frame or the stream ended.
    ClientClosed,
    /// Reading from the transport failed.
    ReadError,
    /// Client sent a frame larger than the limit.
    Oversize,
    /// Writing an event or ping failed.
    WriteError,
    /// The hub dropped this subscriber.
    HubClosed,
}

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_INBOUND_BYTES)
        .on_upgrade(move |socket| run_connection(socket, state))
}

async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    drive(
        sink,
        stream,
        state.hub.clone(),
        Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
    )
    .await;
}

/// Register with the hub and pump events until either direction fails.
pub async fn drive<S, R, E>(sink: S, stream: R, hub: HubHandle, heartbeat: Duration) -> Closed
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let sub = hub.register();
    let conn_id = sub.id();
    info!(%conn_id, "viewer connected");

    let cancel = CancellationToken::new();
    let (inbound, outbound) = tokio::join!(
        watch_inbound(stream, cancel.clone(), conn_id),
        drain_outbound(sink, sub, cancel.clone(), heartbeat),
    );

    hub.unregister(conn_id);
    let reason = inbound.or(outbound).unwrap_or(Closed::ClientClosed);
    info!(%conn_id, ?reason, "viewer disconnected");
    reason
}

/// Returns `None` when stopped by the other half.
async fn watch_inbound<R, E>(
    mut stream: R,
    cancel: CancellationToken,
    conn_id: impl Display,
) -> Option<Closed>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let reason = loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return None,
            msg = stream.next() => msg,
        };
        match msg {
            None | Some(Ok(Message::Close(_))) => break Closed::ClientClosed,
            Some(Err(e)) => {
                debug!(%conn_id, error = %e, "read failed");
                break Closed::ReadError;
            }
            Some(Ok(Message::Text(text))) if text.len() > MAX_INBOUND_BYTES => {
                warn!(%conn_id, size = text.len(), "inbound frame too large");
                break Closed::Oversize;
            }
            Some(Ok(Message::Binary(data))) if data.len() > MAX_INBOUND_BYTES => {
                warn!(%conn_id, size = data.len(), "inbound frame too large");
                break Closed::Oversize;
            }
            // Viewers have nothing to say; pings are answered by the transport.
            Some(Ok(_)) => {}
        }
    };
    cancel.cancel();
    Some(reason)
}

async fn drain_outbound<S>(
    mut sink: S,
    mut sub: Subscription,
    cancel: CancellationToken,
    heartbeat: Duration,
) -> Option<Closed>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let conn_id = sub.id();
    let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + heartbeat, heartbeat);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let reason = loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                close_quietly(&mut sink).await;
                return None;
            }
            event = sub.recv() => match event {
                Some(event) => match event.to_frame() {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        warn!(%conn_id, event = %event.kind(), error = %e, "event serialization failed");
                        continue;
                    }
                },
                None => break Closed::HubClosed,
            },
            _ = tick.tick() => Message::Ping(Default::default()),
        };

        // A peer that stopped reading must not pin this half past cancellation.
        let sent = tokio::select! {
            _ = cancel.cancelled() => {
                close_quietly(&mut sink).await;
                return None;
            }
            sent = sink.send(frame) => sent,
        };
        if let Err(e) = sent {
            debug!(%conn_id, error = %e, "write failed");
            break Closed::WriteError;
        }
    };
    cancel.cancel();
    close_quietly(&mut sink).await;
    Some(reason)
}

async fn close_quietly<S>(sink: &mut S)
where
    S: Sink<Message> + Unpin,
{
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
}

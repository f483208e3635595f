use std::collections::HashMap;
use std::sync::Arc;

use parkwatch_protocol::HubEvent;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::handle::{HubHandle, SubscriberId};

pub(crate) enum Command {
    Register {
        id: SubscriberId,
        tx: mpsc::Sender<Arc<HubEvent>>,
    },
    Unregister {
        id: SubscriberId,
    },
    Broadcast {
        event: Arc<HubEvent>,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub subscribers: usize,
    pub events_broadcast: u64,
    /// Frames discarded because a subscriber queue was full.
    pub frames_dropped: u64,
}

struct Subscriber {
    tx: mpsc::Sender<Arc<HubEvent>>,
    dropped: u64,
}

/// Owner of the live subscriber set.
///
/// Runs as one task; all mutation arrives through the command channel, so
/// registration, removal and fan-out are serialized without a lock.
pub struct BroadcastHub {
    rx: mpsc::UnboundedReceiver<Command>,
    subscribers: HashMap<SubscriberId, Subscriber>,
    stats: HubStats,
}

impl BroadcastHub {
    /// Create a hub and its first handle. `queue_capacity` bounds each
    /// subscriber's outbound queue.
    pub fn new(queue_capacity: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            rx,
            subscribers: HashMap::new(),
            stats: HubStats::default(),
        };
        (hub, HubHandle::new(tx, queue_capacity.max(1)))
    }

    /// Build a hub and run it on the current tokio runtime.
    pub fn spawn(queue_capacity: usize) -> HubHandle {
        let (hub, handle) = Self::new(queue_capacity);
        tokio::spawn(hub.run());
        handle
    }

    /// Process commands until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("broadcast hub started");
        while let Some(cmd) = self.rx.recv().await {
            self.apply(cmd);
        }
        info!(
            events = self.stats.events_broadcast,
            dropped = self.stats.frames_dropped,
            "broadcast hub stopped"
        );
    }

    fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Register { id, tx } => {
                self.subscribers.insert(id, Subscriber { tx, dropped: 0 });
                debug!(subscriber = %id, total = self.subscribers.len(), "subscriber registered");
            }
            Command::Unregister { id } => {
                if let Some(sub) = self.subscribers.remove(&id) {
                    debug!(
                        subscriber = %id,
                        dropped = sub.dropped,
                        total = self.subscribers.len(),
                        "subscriber unregistered"
                    );
                }
            }
            Command::Broadcast { event } => self.fan_out(event),
            Command::Stats { reply } => {
                let mut stats = self.stats;
                stats.subscribers = self.subscribers.len();
                let _ = reply.send(stats);
            }
        }
    }

    fn fan_out(&mut self, event: Arc<HubEvent>) {
        self.stats.events_broadcast += 1;
        let kind = event.kind();
        let mut closed = Vec::new();

        for (id, sub) in self.subscribers.iter_mut() {
            match sub.tx.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.dropped += 1;
                    self.stats.frames_dropped += 1;
                    warn!(
                        subscriber = %id,
                        event = %kind,
                        dropped = sub.dropped,
                        "subscriber queue full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            self.subscribers.remove(&id);
            debug!(subscriber = %id, "pruned closed subscriber");
        }
    }
}

use std::fmt;
use std::sync::Arc;

use parkwatch_protocol::HubEvent;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{HubError, Result};
use crate::hub::{Command, HubStats};

/// Identity of one registered viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cheap, cloneable front door to the hub task.
///
/// None of these methods wait on subscribers. They only enqueue a command
/// for the hub task, so HTTP handlers and background reconcilers can call
/// them freely.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<Command>,
    queue_capacity: usize,
}

impl HubHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>, queue_capacity: usize) -> Self {
        Self { tx, queue_capacity }
    }

    /// Add a new subscriber and return its receiving end.
    ///
    /// The subscriber sees every event broadcast after this call returns,
    /// and none broadcast before it.
    pub fn register(&self) -> Subscription {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        if self.tx.send(Command::Register { id, tx }).is_err() {
            // Receiver side closes immediately: the subscription yields None.
            warn!(subscriber = %id, "register on stopped hub");
        }
        Subscription { id, rx }
    }

    /// Remove a subscriber and release its queue. Unknown or already
    /// removed ids are ignored.
    pub fn unregister(&self, id: SubscriberId) {
        if self.tx.send(Command::Unregister { id }).is_err() {
            debug!(subscriber = %id, "unregister on stopped hub");
        }
    }

    /// Queue `event` for every subscriber registered at this point.
    pub fn broadcast(&self, event: HubEvent) {
        let kind = event.kind();
        if self
            .tx
            .send(Command::Broadcast {
                event: Arc::new(event),
            })
            .is_err()
        {
            warn!(event = %kind, "broadcast hub stopped, event discarded");
        }
    }

    /// Snapshot of hub counters. Also acts as a barrier: every command sent
    /// from this handle before the call has been processed when it returns.
    pub async fn stats(&self) -> Result<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stats { reply })
            .map_err(|_| HubError::Stopped)?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Receiving end of one subscriber's outbound queue.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<HubEvent>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued event, or `None` once the subscriber has been removed
    /// from the hub and its queue drained.
    pub async fn recv(&mut self) -> Option<Arc<HubEvent>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<HubEvent>> {
        self.rx.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

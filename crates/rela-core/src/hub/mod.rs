//! EventHub - fan-out of events to connected observers.
//!
//! Each observer connection registers and receives the consuming half of a
//! bounded queue; the hub keeps only the sending half. Publishing serializes
//! the event once and offers the frame to every queue without awaiting, so a
//! slow or dead observer never holds up the publisher or other observers.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::BroadcastEvent;

/// Default per-observer queue capacity
pub const DEFAULT_OBSERVER_BUFFER: usize = 256;

/// A serialized event frame, shared across all observers.
pub type Frame = Arc<str>;

/// The observer side of a hub registration.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<Frame>,
}

impl Subscription {
    /// Connection id, used to unregister
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next frame. Returns `None` once the hub dropped this observer.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Take a frame if one is ready
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

/// Set of live observer connections.
#[derive(Debug)]
pub struct EventHub {
    observers: DashMap<Uuid, mpsc::Sender<Frame>>,
    buffer: usize,
}

impl EventHub {
    /// Create a hub whose observers each buffer up to `buffer` frames.
    ///
    /// An observer that falls `buffer` frames behind misses events until it
    /// catches up.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a new observer. It sees only events published from now on.
    pub fn register(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.observers.insert(id, sender);
        debug!(observer = %id, "Observer registered");
        Subscription { id, receiver }
    }

    /// Remove an observer. Unknown ids are ignored.
    ///
    /// Returns whether the observer was still registered.
    pub fn unregister(&self, id: Uuid) -> bool {
        let removed = self.observers.remove(&id).is_some();
        if removed {
            debug!(observer = %id, "Observer unregistered");
        }
        removed
    }

    /// Publish an event to all registered observers.
    ///
    /// Returns the number of observers that accepted the frame. Observers whose
    /// connection has gone away are dropped from the set.
    pub fn publish(&self, event: &BroadcastEvent) -> usize {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(kind = event.kind(), error = %e, "Failed to serialize event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();

        for observer in self.observers.iter() {
            match observer.value().try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(observer = %observer.key(), kind = event.kind(), "Observer lagging, event skipped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*observer.key()),
            }
        }

        for id in closed {
            self.unregister(id);
        }

        delivered
    }

    /// Number of registered observers
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_OBSERVER_BUFFER)
    }
}

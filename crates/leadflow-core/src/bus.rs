//! Real-time event bus.
//!
//! Pipeline code publishes message events here; whatever transport is
//! connected (the websocket route, tests) subscribes independently.
//! Emission is best-effort and never fails the pipeline — no subscribers
//! just means nobody is watching right now.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::contact::{Contact, StoredMessage};

/// An event published to connected real-time observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    MessageReceived {
        contact: Contact,
        message: StoredMessage,
    },
    MessageSent {
        contact: Contact,
        message: StoredMessage,
    },
}

/// Broadcast fan-out for [`BusEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Never blocks, never errors.
    pub fn emit(&self, event: BusEvent) {
        if self.tx.send(event).is_err() {
            debug!("event bus: no subscribers connected");
        }
    }

    /// Subscribe to the stream. Slow receivers may observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

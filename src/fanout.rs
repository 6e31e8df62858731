//! Delivery of newly persisted records to live subscribers.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;
use ts_rs::TS;

use crate::data::models::MissingPerson;

/// Event type for records that were persisted for the first time.
pub const NEW_RECORDS_EVENT: &str = "new_records";

/// Event type for the recent-records snapshot sent when a subscriber connects.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// Buffered events per subscriber before it starts skipping.
const CHANNEL_CAPACITY: usize = 64;

/// Anything that can push a batch of records to its subscribers.
pub trait BroadcastSink: Send + Sync {
    /// Returns the number of subscribers the event was handed to.
    fn broadcast(&self, event: &str, payload: &[MissingPerson]) -> usize;
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub records: Vec<MissingPerson>,
}

impl StreamEvent {
    pub fn new(kind: &str, records: Vec<MissingPerson>) -> Self {
        Self {
            kind: kind.to_string(),
            records,
        }
    }
}

/// Fan-out over a tokio broadcast channel; each WebSocket holds one receiver.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<Arc<StreamEvent>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StreamEvent>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl BroadcastSink for EventHub {
    fn broadcast(&self, event: &str, payload: &[MissingPerson]) -> usize {
        let event = Arc::new(StreamEvent::new(event, payload.to_vec()));
        // A send error only means nobody is listening.
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(delivered, count = payload.len(), "Broadcast records");
        delivered
    }
}

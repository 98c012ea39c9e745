use crate::sse::models::{EventSender, PollEvent};
use tokio::sync::broadcast;
use tracing::trace;

pub const EVENT_CAPACITY: usize = 100;

pub fn create_event_broadcaster() -> EventSender {
    let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
    tx
}

/// Fire and forget: having no live subscribers is not an error.
pub fn publish(tx: &EventSender, event: PollEvent) {
    if tx.send(event).is_err() {
        trace!("No results streams listening");
    }
}

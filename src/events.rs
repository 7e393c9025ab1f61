//! Notifications for other parts of the app (open review panels, deck lists)

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::blocks::DbId;
use crate::flashcards::{Grade, StateKey};

/// Capacity of the event channel; slow receivers see `Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SrsEvent {
    #[serde(rename_all = "camelCase")]
    CardGraded {
        block_id: DbId,
        key: StateKey,
        grade: Grade,
        due: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    CardBuried {
        block_id: DbId,
        key: StateKey,
        due: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    CardSuspended { block_id: DbId, suspended: bool },
}

impl SrsEvent {
    /// Event name as seen by listeners in the host
    pub fn name(&self) -> &'static str {
        match self {
            SrsEvent::CardGraded { .. } => "srs.cardGraded",
            SrsEvent::CardBuried { .. } => "srs.cardBuried",
            SrsEvent::CardSuspended { .. } => "srs.cardSuspended",
        }
    }

    pub fn block_id(&self) -> DbId {
        match self {
            SrsEvent::CardGraded { block_id, .. }
            | SrsEvent::CardBuried { block_id, .. }
            | SrsEvent::CardSuspended { block_id, .. } => *block_id,
        }
    }
}

/// Fan-out of SRS events to any number of subscribers
pub struct EventBus {
    sender: broadcast::Sender<SrsEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SrsEvent> {
        self.sender.subscribe()
    }

    /// Send to current subscribers; no subscribers is not an error
    pub fn emit(&self, event: SrsEvent) {
        log::debug!("Emitting {} for block {}", event.name(), event.block_id());
        let _ = self.sender.send(event);
    }
}

use chatline_core::{Message, SessionState};
use tokio::sync::broadcast;

/// Observable changes published by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    MessageAppended(Message),
    TurnFailed { reason: String },
    /// A reply arrived for a conversation that has since been cleared.
    ResponseDiscarded { generation: u64 },
    Cleared,
    /// The durable copy is stale; the in-memory transcript is still correct.
    PersistenceWarning { reason: String },
}

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers reached. Zero is not an error.
    pub fn publish(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

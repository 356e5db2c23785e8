use crate::domain::events::ProcessingEvent;
use crate::ports::notifier::EventSink;
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Sending half of a client's event channel.
#[derive(Debug, Clone)]
pub struct SessionChannel {
    id: SessionId,
    sender: mpsc::UnboundedSender<ProcessingEvent>,
}

impl SessionChannel {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns false if the client side has gone away.
    pub fn send(&self, event: ProcessingEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Holds the single addressable client session.
///
/// Registering a new session silently replaces the previous one; the old
/// receiver stops getting events.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    current: Mutex<Option<SessionChannel>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (SessionId, mpsc::UnboundedReceiver<ProcessingEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let channel = SessionChannel {
            id: SessionId::new(),
            sender,
        };
        let id = channel.id;
        if let Some(previous) = self.current.lock().replace(channel) {
            info!(previous = %previous.id, session = %id, "session replaced");
        } else {
            info!(session = %id, "session registered");
        }
        (id, receiver)
    }

    /// Clear the binding if `id` is still the current session. Returns whether it was cleared.
    pub fn clear(&self, id: SessionId) -> bool {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(channel) if channel.id == id => {
                *current = None;
                info!(session = %id, "session cleared");
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<SessionChannel> {
        self.current.lock().clone()
    }
}

impl EventSink for SessionRegistry {
    /// Deliver `event` to the current session. Dropped when nobody is connected.
    fn emit(&self, event: ProcessingEvent) -> bool {
        match self.current() {
            Some(channel) => {
                let delivered = channel.send(event);
                if !delivered {
                    debug!(session = %channel.id, "session receiver closed, event dropped");
                }
                delivered
            }
            None => {
                debug!(event = event.name(), "no session connected, event dropped");
                false
            }
        }
    }
}

use thiserror::Error;

use super::event::Event;

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event bus closed")]
    Closed,
}

/// Cloneable handle for publishing events onto the bus.
///
/// Held by the orchestrator core and the poll task; emission is
/// synchronous and non-blocking (the channel is unbounded), so it is safe
/// to emit while holding a lock.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    sender: flume::Sender<Event>,
}

impl EventEmitter {
    pub(super) fn new(sender: flume::Sender<Event>) -> Self {
        Self { sender }
    }

    pub fn emit(&self, event: Event) -> Result<(), EmitterError> {
        self.sender.send(event).map_err(|_| EmitterError::Closed)
    }
}

//! Awaitable subscription to the live event feed.
//!
//! Sinks receive every event; a subscription receives events emitted *after*
//! it was opened, over a bounded broadcast channel. A subscriber that falls
//! behind loses the oldest events (counted, never silently) rather than
//! stalling the orchestrator.

use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time::timeout;

use super::event::Event;

/// Live subscription to an [`EventBus`](super::EventBus).
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use skein::event_bus::{Event, EventBus};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::default();
/// bus.listen_for_events();
/// let mut stream = bus.subscribe();
///
/// bus.emitter().emit(Event::diagnostic("demo", "hello")).unwrap();
///
/// let event = stream.next_timeout(Duration::from_secs(1)).await.unwrap();
/// assert_eq!(event.message(), "hello");
/// # }
/// ```
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<Event>,
    missed: u64,
}

impl EventStream {
    pub(super) fn new(receiver: broadcast::Receiver<Event>) -> Self {
        Self {
            receiver,
            missed: 0,
        }
    }

    /// Await the next event. `Err` means the bus was dropped; lagging skips
    /// ahead to the oldest retained event after bumping [`missed`](Self::missed).
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        match self.receiver.recv().await {
            Err(RecvError::Lagged(n)) => {
                self.missed += n;
                Err(RecvError::Lagged(n))
            }
            other => other,
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        match self.receiver.try_recv() {
            Err(TryRecvError::Lagged(n)) => {
                self.missed += n;
                Err(TryRecvError::Lagged(n))
            }
            other => other,
        }
    }

    /// Await the next event for at most `duration`. `None` on timeout or a
    /// dropped bus; lagging is skipped over transparently.
    pub async fn next_timeout(&mut self, duration: Duration) -> Option<Event> {
        loop {
            match timeout(duration, self.recv()).await {
                Ok(Ok(event)) => return Some(event),
                Ok(Err(RecvError::Lagged(_))) => continue,
                Ok(Err(RecvError::Closed)) => return None,
                Err(_) => return None,
            }
        }
    }

    /// Events dropped because this subscriber lagged behind the buffer.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Adapt into a [`Stream`] that ends when the bus is dropped and skips
    /// over lag gaps.
    pub fn into_async_stream(self) -> impl Stream<Item = Event> {
        stream::unfold(self, |mut events| async move {
            loop {
                match events.recv().await {
                    Ok(event) => return Some((event, events)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};
use tokio::task;

use crate::config::{EventBusConfig, SinkConfig, DEFAULT_BUFFER_CAPACITY};

use super::emitter::EventEmitter;
use super::event::Event;
use super::sink::{EventSink, MemorySink, StdOutSink};
use super::stream::EventStream;

/// Receives events from the orchestrator and broadcasts to all sinks.
///
/// Besides the configured sinks, live observers can [`subscribe`](Self::subscribe)
/// and await events as they happen.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    event_channel: (flume::Sender<Event>, flume::Receiver<Event>),
    broadcast: broadcast::Sender<Event>,
    listener: Arc<Mutex<Option<ListenerState>>>,
    memory_sink: Option<MemorySink>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    /// Bus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self {
            sinks: Arc::new(Mutex::new(vec![Box::new(sink)])),
            event_channel: flume::unbounded(),
            broadcast: broadcast::channel(DEFAULT_BUFFER_CAPACITY).0,
            listener: Arc::new(Mutex::new(None)),
            memory_sink: None,
        }
    }

    /// Bus wired from configuration. When the config names a memory sink,
    /// the bus keeps a handle to it, retrievable via
    /// [`memory_sink`](Self::memory_sink).
    pub fn from_config(config: &EventBusConfig) -> Self {
        let mut sinks: Vec<Box<dyn EventSink>> = Vec::new();
        let mut memory_sink = None;
        for sink in config.sinks() {
            match sink {
                SinkConfig::StdOut => sinks.push(Box::new(StdOutSink::default())),
                SinkConfig::Memory => {
                    let sink = MemorySink::new();
                    memory_sink = Some(sink.clone());
                    sinks.push(Box::new(sink));
                }
            }
        }
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            event_channel: flume::unbounded(),
            broadcast: broadcast::channel(config.buffer_capacity.max(1)).0,
            listener: Arc::new(Mutex::new(None)),
            memory_sink,
        }
    }

    /// Dynamically add a sink (useful for per-view streaming).
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().expect("sinks poisoned").push(Box::new(sink));
    }

    /// Handle to the memory sink, when the config asked for one.
    pub fn memory_sink(&self) -> Option<MemorySink> {
        self.memory_sink.clone()
    }

    /// Cloneable emitter for producers.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter::new(self.event_channel.0.clone())
    }

    /// Live subscription starting at the next event. Slow subscribers lose
    /// the oldest buffered events rather than blocking the listener.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.broadcast.subscribe())
    }

    /// Spawn the background task that forwards events to every sink.
    /// Idempotent: calling this twice has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return; // Already listening
        }

        let receiver = self.event_channel.1.clone();
        let sinks = self.sinks.clone();
        let broadcast = self.broadcast.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break, // all senders dropped
                        Ok(event) => {
                            // Err here just means nobody is subscribed.
                            let _ = broadcast.send(event.clone());
                            let mut sinks_guard = sinks.lock().expect("sinks poisoned");
                            for sink in sinks_guard.iter_mut() {
                                if let Err(e) = sink.handle(&event) {
                                    eprintln!("event sink error: {e}");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener and wait for it to exit. Events still
    /// queued when the shutdown lands are dropped.
    pub async fn stop_listener(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(state) = guard.take() {
                let _ = state.shutdown_tx.send(());
                state.handle.abort();
            }
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

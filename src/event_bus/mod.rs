//! Event fan-out for observers of a run.
//!
//! The orchestrator publishes structured [`Event`]s (phase changes, node
//! resolutions, diagnostics) onto a flume channel; a background listener
//! broadcasts each one to the configured sinks and to live subscribers.
//! Rendering layers observe incremental completion here instead of polling
//! the orchestrator.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod sink;
pub mod stream;

pub use bus::EventBus;
pub use emitter::{EmitterError, EventEmitter};
pub use event::{DiagnosticEvent, Event, NodeResolvedEvent, RunPhaseEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
pub use stream::EventStream;

//! The run lifecycle, end to end.
//!
//! Layered bottom-up:
//!
//! - [`status`] / [`state`]: the flat status enum and the tagged-union
//!   state it is derived from
//! - [`result`]: per-node outcomes and the append-only result map
//! - [`request`]: submission payloads pinned to a graph snapshot
//! - [`machine`]: the single pure transition rule
//! - [`poller`]: the cancellable scheduled task that feeds poll outcomes
//!   back into the machine
//! - [`orchestrator`]: the caller-facing facade that owns all of it
//!
//! Everything below the orchestrator is synchronous and side-effect free,
//! which is what makes the lifecycle testable without a service.

pub mod machine;
pub mod orchestrator;
pub(crate) mod poller;
pub mod request;
pub mod result;
pub mod state;
pub mod status;

pub use machine::{RunEvent, transition};
pub use orchestrator::{OrchestratorError, RunOrchestrator};
pub use request::{RequestError, RunRequest, RunRequestBuilder, SubmitOptions};
pub use result::{MergeOutcome, NodeResult, OutputKind, OutputPath, RunResultMap};
pub use state::RunState;
pub use status::{RunButtonKind, RunButtonMode, RunStatus};

//! The run lifecycle as a tagged union.
//!
//! Each variant carries exactly the data that exists in that state, so
//! "which fields are set when" is enforced by the type instead of by
//! convention: there is no run identifier before the service assigns one,
//! no result map before it is seeded, and nothing but the failure message
//! when a launch is rejected.

use crate::types::RunId;

use super::request::RunRequest;
use super::result::RunResultMap;
use super::status::RunStatus;

/// Current state of the tracked run. Mutated only through
/// [`transition`](super::machine::transition).
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RunState {
    /// No run yet.
    #[default]
    Uninitialized,

    /// Submission sent; acknowledgment outstanding. The request is kept so
    /// acceptance can derive the pending seed from the submitted graph.
    Pending { request: RunRequest },

    /// Identifier obtained, result map seeded, polling active.
    Success {
        run_id: RunId,
        results: RunResultMap,
    },

    /// Every node resolved (some may have resolved as errors).
    Finished {
        run_id: RunId,
        results: RunResultMap,
    },

    /// A poll cycle failed; whatever had merged so far is retained.
    Aborted {
        run_id: RunId,
        results: RunResultMap,
        message: String,
    },

    /// The launch itself was rejected before an identifier existed.
    Error { message: String },

    /// Explicit user cancellation. No identifier when the cancel landed
    /// while the submission was still unacknowledged.
    Canceled { run_id: Option<RunId> },
}

impl RunState {
    /// Flat status of this state.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        match self {
            RunState::Uninitialized => RunStatus::Uninitialized,
            RunState::Pending { .. } => RunStatus::Pending,
            RunState::Success { .. } => RunStatus::Success,
            RunState::Finished { .. } => RunStatus::Finished,
            RunState::Aborted { .. } => RunStatus::Aborted,
            RunState::Error { .. } => RunStatus::Error,
            RunState::Canceled { .. } => RunStatus::Canceled,
        }
    }

    /// The run identifier, in states that have one.
    #[must_use]
    pub fn run_id(&self) -> Option<&RunId> {
        match self {
            RunState::Success { run_id, .. }
            | RunState::Finished { run_id, .. }
            | RunState::Aborted { run_id, .. } => Some(run_id),
            RunState::Canceled { run_id } => run_id.as_ref(),
            _ => None,
        }
    }

    /// The result map, in states that have one.
    #[must_use]
    pub fn results(&self) -> Option<&RunResultMap> {
        match self {
            RunState::Success { results, .. }
            | RunState::Finished { results, .. }
            | RunState::Aborted { results, .. } => Some(results),
            _ => None,
        }
    }
}

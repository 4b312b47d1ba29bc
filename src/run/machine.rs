//! The transition function: one pure rule for every way a run can move.
//!
//! All mutation of [`RunState`] funnels through [`transition`]. Events are
//! stamped with the run identifier they belong to, and staleness is decided
//! here, at the moment the event is processed: an acknowledgment or poll
//! response for a run that is no longer current returns the state unchanged.
//! That single rule is what makes cancellation airtight without any
//! coordination with in-flight requests.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::types::{NodeId, RunId};

use super::request::RunRequest;
use super::result::{NodeResult, RunResultMap};
use super::state::RunState;

/// The closed input alphabet of the run state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    /// Start a brand-new run.
    Launch { request: RunRequest },
    /// Re-run under the identifier already bound to the session. Same
    /// transition rule as [`Launch`](Self::Launch); the distinction only
    /// matters to the client call the orchestrator makes.
    Relaunch { request: RunRequest },
    /// The service acknowledged the submission and assigned an identifier.
    LaunchAccepted { run_id: RunId },
    /// The submission was rejected or failed in transport.
    LaunchRejected { message: String },
    /// A poll cycle returned a partial result map.
    PollDelivered {
        run_id: RunId,
        partial: FxHashMap<NodeId, NodeResult>,
    },
    /// A poll cycle failed.
    PollFaulted { run_id: RunId, message: String },
    /// Explicit user cancellation. Always succeeds.
    Cancel,
    /// A stored experiment record was reconstructed.
    ExperimentLoaded {
        run_id: RunId,
        results: RunResultMap,
    },
    /// The distinguished `default` identifier was imported: nothing bound.
    ExperimentCleared,
    /// Import or fetch failed; never retain stale state.
    LoadFailed,
}

impl RunEvent {
    /// Short label for logs and events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            RunEvent::Launch { .. } => "launch",
            RunEvent::Relaunch { .. } => "relaunch",
            RunEvent::LaunchAccepted { .. } => "launch_accepted",
            RunEvent::LaunchRejected { .. } => "launch_rejected",
            RunEvent::PollDelivered { .. } => "poll_delivered",
            RunEvent::PollFaulted { .. } => "poll_faulted",
            RunEvent::Cancel => "cancel",
            RunEvent::ExperimentLoaded { .. } => "experiment_loaded",
            RunEvent::ExperimentCleared => "experiment_cleared",
            RunEvent::LoadFailed => "load_failed",
        }
    }
}

/// Apply one event to one state. Pure and total: every `(state, event)`
/// pair is defined, and pairs that make no sense (stale stamps, events
/// arriving in the wrong state) return the state unchanged.
#[must_use]
pub fn transition(state: RunState, event: RunEvent) -> RunState {
    match (state, event) {
        // Launching is allowed from scratch and from any terminal state.
        // Pending and Success reject new submissions at the caller-facing
        // contract; here they simply absorb the event.
        (
            RunState::Uninitialized
            | RunState::Finished { .. }
            | RunState::Aborted { .. }
            | RunState::Error { .. }
            | RunState::Canceled { .. },
            RunEvent::Launch { request } | RunEvent::Relaunch { request },
        ) => RunState::Pending { request },

        // Acceptance seeds the result map from the submitted graph. A graph
        // with nothing to poll is finished the moment it is accepted, the
        // same rule imports follow.
        (RunState::Pending { request }, RunEvent::LaunchAccepted { run_id }) => {
            let results = RunResultMap::seeded(request.pending_seed());
            if results.is_settled() {
                RunState::Finished { run_id, results }
            } else {
                RunState::Success { run_id, results }
            }
        }

        (RunState::Pending { .. }, RunEvent::LaunchRejected { message }) => {
            RunState::Error { message }
        }

        // Poll results merge only into the run they were stamped with.
        (
            RunState::Success { run_id, mut results },
            RunEvent::PollDelivered {
                run_id: stamped,
                partial,
            },
        ) => {
            if stamped != run_id {
                debug!(current = %run_id, stamped = %stamped, "discarding stale poll response");
                return RunState::Success { run_id, results };
            }
            let outcome = results.merge(partial);
            if outcome.downgrades_ignored > 0 {
                debug!(
                    ignored = outcome.downgrades_ignored,
                    "poll tried to demote resolved nodes"
                );
            }
            if outcome.pending_remaining == 0 {
                RunState::Finished { run_id, results }
            } else {
                RunState::Success { run_id, results }
            }
        }

        (
            RunState::Success { run_id, results },
            RunEvent::PollFaulted {
                run_id: stamped,
                message,
            },
        ) => {
            if stamped != run_id {
                debug!(current = %run_id, stamped = %stamped, "discarding stale poll fault");
                return RunState::Success { run_id, results };
            }
            RunState::Aborted {
                run_id,
                results,
                message,
            }
        }

        // Cancel interrupts an unacknowledged submission or a polling run;
        // terminal states absorb it so cancel can always succeed.
        (RunState::Pending { .. }, RunEvent::Cancel) => RunState::Canceled { run_id: None },
        (RunState::Success { run_id, .. }, RunEvent::Cancel) => RunState::Canceled {
            run_id: Some(run_id),
        },

        // Import replaces the run wholesale, from any state.
        (_, RunEvent::ExperimentLoaded { run_id, results }) => {
            if results.is_settled() {
                RunState::Finished { run_id, results }
            } else {
                RunState::Success { run_id, results }
            }
        }
        (_, RunEvent::ExperimentCleared) => RunState::Uninitialized,
        (_, RunEvent::LoadFailed) => RunState::Uninitialized,

        // Everything else is a stale or out-of-place event: a launch
        // acknowledgment after a cancel, a poll for a finished run, a
        // cancel with nothing to cancel. No observable effect.
        (state, event) => {
            debug!(status = %state.status(), event = event.label(), "event absorbed without transition");
            state
        }
    }
}

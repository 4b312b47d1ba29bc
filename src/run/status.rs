//! Flat run status and the derived run-button mode.
//!
//! [`RunStatus`] is the Copy, serializable face of the richer
//! [`RunState`](super::state::RunState) tagged union: every state maps to
//! exactly one status, and display layers should only ever need this enum.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::PipelineUid;

use super::state::RunState;

/// Lifecycle status of the tracked run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No run yet (fresh session, cleared binding, or failed import).
    Uninitialized,
    /// Submission sent; acknowledgment outstanding. Submission is locked.
    Pending,
    /// Run identifier obtained, result map seeded, polling active.
    Success,
    /// Every node resolved; zero pending entries remain.
    Finished,
    /// A poll cycle failed; partial results retained.
    Aborted,
    /// The launch itself was rejected before an identifier existed.
    Error,
    /// Explicit user cancellation.
    Canceled,
}

impl RunStatus {
    /// No further transitions happen without a new user action.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Finished | RunStatus::Aborted | RunStatus::Error | RunStatus::Canceled
        )
    }

    /// The poll loop should be running in exactly this status.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        matches!(self, RunStatus::Success)
    }

    /// A new submission must be rejected while this holds.
    #[must_use]
    pub fn is_submission_locked(&self) -> bool {
        matches!(self, RunStatus::Pending)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Uninitialized => "uninitialized",
            RunStatus::Pending => "pending",
            RunStatus::Success => "success",
            RunStatus::Finished => "finished",
            RunStatus::Aborted => "aborted",
            RunStatus::Error => "error",
            RunStatus::Canceled => "canceled",
        };
        write!(f, "{label}")
    }
}

/// Which action the run control offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunButtonKind {
    /// Start a brand-new run.
    RunNew,
    /// Re-run under the identifier already bound to this session.
    RunExisting,
}

/// Display/control state derived from the run state and pipeline binding.
///
/// Never stored: always recomputed, so it cannot drift from the state
/// machine.
///
/// # Examples
///
/// ```rust
/// use skein::run::{RunButtonKind, RunButtonMode, RunState};
/// use skein::types::PipelineUid;
///
/// let mode = RunButtonMode::derive(&RunState::Uninitialized, &PipelineUid::Default);
/// assert_eq!(mode.kind, RunButtonKind::RunNew);
/// assert!(!mode.submission_locked);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunButtonMode {
    pub kind: RunButtonKind,
    /// True while a submission's acknowledgment is outstanding.
    pub submission_locked: bool,
}

impl RunButtonMode {
    /// Derive the button mode from the current state and binding.
    ///
    /// `RunExisting` whenever a run identifier is bound, live or imported;
    /// otherwise `RunNew`. Locked exactly while the state is `pending`.
    #[must_use]
    pub fn derive(state: &RunState, binding: &PipelineUid) -> Self {
        let has_identifier = state.run_id().is_some() || !binding.is_default();
        Self {
            kind: if has_identifier {
                RunButtonKind::RunExisting
            } else {
                RunButtonKind::RunNew
            },
            submission_locked: state.status().is_submission_locked(),
        }
    }
}

//! Core identifier types for the skein orchestration layer.
//!
//! This module defines the fundamental identifiers used throughout the crate
//! for naming runs, pipelines, and graph nodes. These are the core domain
//! concepts that define what a tracked run *is*.
//!
//! # Key Types
//!
//! - [`RunId`]: Opaque identifier the execution service assigns to a run
//! - [`PipelineUid`]: Identity of a stored experiment a session may be bound to
//! - [`NodeId`]: Identifier of a node within the composed graph
//!
//! # Examples
//!
//! ```rust
//! use skein::types::{PipelineUid, RunId};
//!
//! let run = RunId::new("3f9a1c2e");
//! assert_eq!(run.as_str(), "3f9a1c2e");
//!
//! // The distinguished "default" uid means "no experiment bound".
//! let binding = PipelineUid::decode("default");
//! assert!(binding.is_default());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node within the composed pipeline graph.
///
/// Node ids are assigned by the graph editor and treated as opaque strings
/// here; the orchestrator only ever compares and clones them.
pub type NodeId = String;

/// Opaque identifier the execution service assigns to a launched run.
///
/// Every asynchronous request and response in the crate is stamped with the
/// `RunId` it belongs to, so responses that outlive their run (late polls,
/// acknowledgments after a cancel) can be recognized and discarded.
///
/// The original service derives these from the first eight characters of a
/// v4 UUID, but nothing in this crate depends on that shape.
///
/// # Examples
///
/// ```rust
/// use skein::types::RunId;
///
/// let id = RunId::new("a1b2c3d4");
/// assert_eq!(id.to_string(), "a1b2c3d4");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Wrap a service-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId::new(s)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        RunId(s)
    }
}

/// Identity of the stored experiment a session is bound to, if any.
///
/// Import and fetch operations bind a session to a stored pipeline uid;
/// starting a brand-new run clears the binding back to
/// [`Default`](Self::Default). The wire form reserves the literal string
/// `"default"` for the unbound case, which is why this is a closed enum and
/// not a bare `Option<String>`: decoding must never confuse a real uid with
/// the sentinel.
///
/// # Examples
///
/// ```rust
/// use skein::types::PipelineUid;
///
/// let bound = PipelineUid::stored("record_2024");
/// assert_eq!(bound.encode(), "record_2024");
///
/// let unbound = PipelineUid::decode("default");
/// assert_eq!(unbound, PipelineUid::Default);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineUid {
    /// Nothing bound; resubmission by identifier is impossible.
    #[default]
    Default,

    /// Bound to the stored experiment with this uid.
    Stored(String),
}

impl PipelineUid {
    /// Wire form of the unbound sentinel.
    pub const DEFAULT_LITERAL: &'static str = "default";

    /// Bind to a stored experiment uid.
    pub fn stored(uid: impl Into<String>) -> Self {
        Self::Stored(uid.into())
    }

    /// Encode into the wire string form.
    ///
    /// - `Default` → `"default"`
    /// - `Stored("X")` → `"X"`
    #[must_use]
    pub fn encode(&self) -> &str {
        match self {
            PipelineUid::Default => Self::DEFAULT_LITERAL,
            PipelineUid::Stored(uid) => uid,
        }
    }

    /// Decode a wire string, mapping the `"default"` sentinel back to
    /// [`Default`](Self::Default).
    pub fn decode(s: &str) -> Self {
        if s == Self::DEFAULT_LITERAL {
            PipelineUid::Default
        } else {
            PipelineUid::Stored(s.to_string())
        }
    }

    /// Returns `true` when no experiment is bound.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// The bound uid, if any.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        match self {
            PipelineUid::Default => None,
            PipelineUid::Stored(uid) => Some(uid),
        }
    }
}

impl fmt::Display for PipelineUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<&str> for PipelineUid {
    fn from(s: &str) -> Self {
        PipelineUid::decode(s)
    }
}

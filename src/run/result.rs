//! Per-node outcomes and the run-wide result map.
//!
//! The execution service reports each node as `pending`, `success`, or
//! `error`. [`RunResultMap`] accumulates those reports across poll cycles:
//! incoming entries overwrite older ones, absent ids are preserved, and a
//! node that has resolved can never be demoted back to pending by a late or
//! reordered response. The run is done exactly when nothing is pending.
//!
//! Decoding is strict on purpose: an unrecognized status string is a decode
//! error, not a silent pending. A service speaking a different dialect
//! should fail the poll loudly rather than stall the run forever.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::NodeId;

/// Kind of artifact a finished node produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Images,
    Timeseries,
    Heatmap,
    Roi,
    Scatter,
    Bar,
    Html,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutputKind::Images => "images",
            OutputKind::Timeseries => "timeseries",
            OutputKind::Heatmap => "heatmap",
            OutputKind::Roi => "roi",
            OutputKind::Scatter => "scatter",
            OutputKind::Bar => "bar",
            OutputKind::Html => "html",
        };
        write!(f, "{label}")
    }
}

/// Location and shape of one output artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPath {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: OutputKind,
    /// Frame count for multi-frame artifacts, when the service knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_index: Option<u64>,
}

impl OutputPath {
    pub fn new(path: impl Into<String>, kind: OutputKind) -> Self {
        Self {
            path: path.into(),
            kind,
            max_index: None,
        }
    }

    #[must_use]
    pub fn with_max_index(mut self, max_index: u64) -> Self {
        self.max_index = Some(max_index);
        self
    }
}

/// Outcome of a single node, as last reported by the service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NodeResult {
    /// Not yet reported done; still in the poll set.
    Pending,
    /// Completed; artifacts are listed by output name.
    Success {
        #[serde(default)]
        message: String,
        #[serde(default, rename = "outputPaths")]
        output_paths: FxHashMap<String, OutputPath>,
    },
    /// The node failed. The run keeps going: a per-node error never changes
    /// the run status by itself.
    Error { message: String },
}

impl NodeResult {
    pub fn success(message: impl Into<String>) -> Self {
        NodeResult::Success {
            message: message.into(),
            output_paths: FxHashMap::default(),
        }
    }

    pub fn success_with_outputs(
        message: impl Into<String>,
        output_paths: FxHashMap<String, OutputPath>,
    ) -> Self {
        NodeResult::Success {
            message: message.into(),
            output_paths,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        NodeResult::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, NodeResult::Pending)
    }

    /// Success or error; anything but pending.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.is_pending()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, NodeResult::Success { .. })
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, NodeResult::Error { .. })
    }

    /// Wire label of this outcome.
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        match self {
            NodeResult::Pending => "pending",
            NodeResult::Success { .. } => "success",
            NodeResult::Error { .. } => "error",
        }
    }

    /// The service-reported message, empty while pending.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            NodeResult::Pending => "",
            NodeResult::Success { message, .. } | NodeResult::Error { message } => message,
        }
    }
}

/// What a merge changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Ids that went from pending (or absent) to resolved in this merge,
    /// sorted.
    pub resolved: Vec<NodeId>,
    /// Pending entries remaining after the merge. Zero means the run is
    /// done.
    pub pending_remaining: usize,
    /// Incoming pendings that would have demoted a resolved entry and were
    /// dropped instead.
    pub downgrades_ignored: usize,
}

/// Run-wide map of node id to latest outcome.
///
/// Keys are only ever added or overwritten, never removed mid-run, and
/// resolution is monotonic: once an id is success or error, no later merge
/// can set it back to pending.
///
/// # Examples
///
/// ```rust
/// use rustc_hash::FxHashMap;
/// use skein::run::{NodeResult, RunResultMap};
///
/// let mut results = RunResultMap::seeded(["a", "b"]);
/// let mut partial = FxHashMap::default();
/// partial.insert("a".to_string(), NodeResult::success("done"));
///
/// let outcome = results.merge(partial);
/// assert_eq!(outcome.resolved, vec!["a".to_string()]);
/// assert_eq!(outcome.pending_remaining, 1);
/// assert!(!results.is_settled());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunResultMap {
    entries: FxHashMap<NodeId, NodeResult>,
}

impl RunResultMap {
    /// Map with every given id pending.
    pub fn seeded<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        let entries = ids
            .into_iter()
            .map(|id| (id.into(), NodeResult::Pending))
            .collect();
        Self { entries }
    }

    /// Map from pre-resolved entries (import reconstruction).
    pub fn from_entries(entries: FxHashMap<NodeId, NodeResult>) -> Self {
        Self { entries }
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeResult> {
        self.entries.get(node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeResult)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids still pending, sorted.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .entries
            .iter()
            .filter(|(_, result)| result.is_pending())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|result| result.is_pending())
            .count()
    }

    /// Zero pending entries: every node resolved one way or the other.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending_count() == 0
    }

    /// Merge a partial report into the map.
    ///
    /// For each incoming id the newer entry wins, with one exception: an
    /// incoming `pending` never replaces an entry that already resolved.
    /// Ids absent from the partial keep their previous entry; unknown ids
    /// are inserted (the service is authoritative about which nodes exist).
    /// Merging an empty partial changes nothing.
    pub fn merge(&mut self, partial: FxHashMap<NodeId, NodeResult>) -> MergeOutcome {
        let mut resolved = Vec::new();
        let mut downgrades_ignored = 0;

        for (node_id, incoming) in partial {
            match self.entries.get(&node_id) {
                Some(existing) if existing.is_resolved() && incoming.is_pending() => {
                    downgrades_ignored += 1;
                }
                Some(existing) => {
                    if existing.is_pending() && incoming.is_resolved() {
                        resolved.push(node_id.clone());
                    }
                    self.entries.insert(node_id, incoming);
                }
                None => {
                    if incoming.is_resolved() {
                        resolved.push(node_id.clone());
                    }
                    self.entries.insert(node_id, incoming);
                }
            }
        }

        resolved.sort_unstable();
        MergeOutcome {
            resolved,
            pending_remaining: self.pending_count(),
            downgrades_ignored,
        }
    }
}

impl<'a> IntoIterator for &'a RunResultMap {
    type Item = (&'a NodeId, &'a NodeResult);
    type IntoIter = std::collections::hash_map::Iter<'a, NodeId, NodeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

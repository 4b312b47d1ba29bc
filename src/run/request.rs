//! Run requests: the immutable payload handed to the execution service.
//!
//! A request is assembled from a [`GraphSnapshot`] taken at submission time,
//! so the graph a run actually executes is pinned the moment the user hits
//! run. Subsequent edits to the store affect the *next* submission only.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::graph::{GraphEdge, GraphSnapshot, PipelineNode};
use crate::types::NodeId;

/// Problems detected while assembling a request.
#[derive(Debug, Error, Diagnostic)]
pub enum RequestError {
    #[error("run request has no nodes")]
    #[diagnostic(
        code(skein::request::empty_graph),
        help("compose at least one node before submitting")
    )]
    EmptyGraph,

    #[error("run request has no name")]
    #[diagnostic(
        code(skein::request::missing_name),
        help("give the run a non-empty name; it labels the stored experiment record")
    )]
    MissingName,
}

/// Caller-chosen parameters of a submission.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use skein::run::SubmitOptions;
///
/// let options = SubmitOptions::named("spont_activity_01")
///     .with_tool_param("nwb", json!({"session_description": "spontaneous"}))
///     .with_force_rerun(["suite2p_roi_1"]);
/// assert_eq!(options.name, "spont_activity_01");
/// ```
#[derive(Clone, Debug, Default)]
pub struct SubmitOptions {
    /// Name recorded on the stored experiment.
    pub name: String,
    /// Per-tool parameter maps, keyed by tool name.
    pub tool_params: FxHashMap<String, Value>,
    /// Node ids whose cached results the service must discard and recompute.
    pub force_rerun: Vec<NodeId>,
}

impl SubmitOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tool_param(mut self, tool: impl Into<String>, value: Value) -> Self {
        self.tool_params.insert(tool.into(), value);
        self
    }

    #[must_use]
    pub fn with_force_rerun<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.force_rerun = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// The submitted payload, already detached from the live graph store.
///
/// Field names follow the service wire format (`nodeDict`, `edgeDict`,
/// `toolParams`, `forceRunList`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub name: String,
    #[serde(rename = "nodeDict")]
    pub nodes: FxHashMap<NodeId, PipelineNode>,
    #[serde(rename = "edgeDict")]
    pub edges: FxHashMap<String, GraphEdge>,
    #[serde(rename = "toolParams", default)]
    pub tool_params: FxHashMap<String, Value>,
    #[serde(rename = "forceRunList", default)]
    pub force_rerun: Vec<NodeId>,
}

impl RunRequest {
    /// Ids that go pending when this request launches: exactly the
    /// algorithm nodes, sorted.
    #[must_use]
    pub fn pending_seed(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.data().is_algorithm())
            .map(|node| node.id().to_string())
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Fluent assembly of a [`RunRequest`] from a snapshot plus options.
///
/// # Examples
///
/// ```rust
/// use skein::graph::{AlgorithmParams, GraphStore, PipelineNode};
/// use skein::run::{RunRequestBuilder, SubmitOptions};
///
/// let mut store = GraphStore::new();
/// store.insert_node(PipelineNode::algorithm(
///     "pca_1",
///     "pca",
///     AlgorithmParams::new("dimension_reduction/pca"),
/// ));
///
/// let request = RunRequestBuilder::new(SubmitOptions::named("demo"))
///     .with_snapshot(store.snapshot())
///     .build()
///     .unwrap();
/// assert_eq!(request.pending_seed(), vec!["pca_1".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct RunRequestBuilder {
    options: SubmitOptions,
    snapshot: GraphSnapshot,
}

impl RunRequestBuilder {
    #[must_use]
    pub fn new(options: SubmitOptions) -> Self {
        Self {
            options,
            snapshot: GraphSnapshot::default(),
        }
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: GraphSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Validate and produce the request.
    pub fn build(self) -> Result<RunRequest, RequestError> {
        if self.options.name.trim().is_empty() {
            return Err(RequestError::MissingName);
        }
        if self.snapshot.is_empty() {
            return Err(RequestError::EmptyGraph);
        }
        Ok(RunRequest {
            name: self.options.name,
            nodes: self.snapshot.nodes,
            edges: self.snapshot.edges,
            tool_params: self.options.tool_params,
            force_rerun: self.options.force_rerun,
        })
    }
}

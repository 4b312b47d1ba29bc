//! In-memory store of the composed pipeline graph.
//!
//! The store owns the node dictionary (with each node's input configuration
//! and resolved paths) and the edge dictionary. Run submission never reads
//! the store directly: it takes a [`GraphSnapshot`], a deep copy, so edits
//! made while a run is in flight cannot mutate the submitted request.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::NodeId;

use super::node::PipelineNode;

/// Errors surfaced by graph-store mutations.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// An upload completion referenced a node that is not in the graph.
    #[error("unknown node: {node_id}")]
    #[diagnostic(
        code(skein::store::unknown_node),
        help("the node may have been deleted after the upload started; re-add it or ignore the completion")
    )]
    UnknownNode { node_id: NodeId },

    /// An upload completion targeted an algorithm node.
    #[error("node {node_id} takes no uploads")]
    #[diagnostic(
        code(skein::store::not_an_input),
        help("only csv, hdf5, and image input nodes accept resolved file paths")
    )]
    NotAnInput { node_id: NodeId },
}

/// A dependency between two nodes, keyed by edge id in the edge dictionary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
}

impl GraphEdge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Deep copy of the graph taken at submission time.
///
/// Holding a snapshot (rather than borrowing the store) is what makes run
/// requests immune to later edits: the builder consumes the copy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: FxHashMap<NodeId, PipelineNode>,
    pub edges: FxHashMap<String, GraphEdge>,
}

impl GraphSnapshot {
    /// Ids of the algorithm nodes, sorted for deterministic seeding.
    ///
    /// Exactly these ids go `pending` when the run launches; input nodes
    /// resolve immediately server-side and are never polled.
    #[must_use]
    pub fn algorithm_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.data().is_algorithm())
            .map(|node| node.id().to_string())
            .collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Mutable store of the composed graph for one pipeline session.
///
/// # Examples
///
/// ```rust
/// use skein::graph::{AlgorithmParams, GraphEdge, GraphStore, ImageParams, PipelineNode};
///
/// let mut store = GraphStore::new();
/// store.insert_node(PipelineNode::image("img_1", "raw stack", ImageParams::default()));
/// store.insert_node(PipelineNode::algorithm(
///     "mc_1",
///     "motion correction",
///     AlgorithmParams::new("caiman/caiman_mc"),
/// ));
/// store.insert_edge("e1", GraphEdge::new("img_1", "mc_1"));
///
/// store.upload_completed("img_1", "data/stack.tif").unwrap();
/// assert_eq!(store.snapshot().algorithm_ids(), vec!["mc_1".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: FxHashMap<NodeId, PipelineNode>,
    edges: FxHashMap<String, GraphEdge>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node, keyed by its id.
    pub fn insert_node(&mut self, node: PipelineNode) {
        self.nodes.insert(node.id().to_string(), node);
    }

    /// Insert or replace an edge under `edge_id`.
    pub fn insert_edge(&mut self, edge_id: impl Into<String>, edge: GraphEdge) {
        self.edges.insert(edge_id.into(), edge);
    }

    pub fn node(&self, node_id: &str) -> Option<&PipelineNode> {
        self.nodes.get(node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PipelineNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&String, &GraphEdge)> {
        self.edges.iter()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record a completed upload for `node_id`.
    ///
    /// Accepted regardless of run status: an upload that finishes while a
    /// run is already polling lands in the store and simply rides along in
    /// the next submission. Single-path variants replace, image stacks
    /// append.
    pub fn upload_completed(&mut self, node_id: &str, path: &str) -> Result<(), StoreError> {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return Err(StoreError::UnknownNode {
                node_id: node_id.to_string(),
            });
        };
        if !node.data_mut().record_upload(path) {
            return Err(StoreError::NotAnInput {
                node_id: node_id.to_string(),
            });
        }
        debug!(node_id, path, "recorded upload");
        Ok(())
    }

    /// Remove a node and every edge touching it.
    ///
    /// Returns `true` if the node existed; removing an absent id is a no-op.
    pub fn remove_node(&mut self, node_id: &str) -> bool {
        if self.nodes.remove(node_id).is_none() {
            return false;
        }
        self.edges.retain(|_, edge| !edge.touches(node_id));
        debug!(node_id, "removed node");
        true
    }

    /// Remove several nodes; returns how many actually existed.
    pub fn remove_nodes<I, S>(&mut self, node_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        node_ids
            .into_iter()
            .filter(|id| self.remove_node(id.as_ref()))
            .count()
    }

    /// Zero the alignment parameters of every image node.
    ///
    /// Idempotent; non-image nodes are untouched. Returns the number of
    /// image nodes visited.
    pub fn reset_alignments(&mut self) -> usize {
        self.nodes
            .values_mut()
            .map(|node| node.reset_alignments())
            .filter(|was_image| *was_image)
            .count()
    }

    /// Deep copy for the request builder.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Replace the whole graph, used when a stored experiment is imported.
    pub fn replace(
        &mut self,
        nodes: FxHashMap<NodeId, PipelineNode>,
        edges: FxHashMap<String, GraphEdge>,
    ) {
        self.nodes = nodes;
        self.edges = edges;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::alignment::{Axes, ImageAlignment};
    use crate::graph::node::{AlgorithmParams, CsvParams, ImageParams, NodeData};

    fn two_node_store() -> GraphStore {
        let mut store = GraphStore::new();
        store.insert_node(PipelineNode::csv("csv_1", "table", CsvParams::default()));
        store.insert_node(PipelineNode::algorithm(
            "pca_1",
            "pca",
            AlgorithmParams::new("dimension_reduction/pca"),
        ));
        store.insert_edge("e1", GraphEdge::new("csv_1", "pca_1"));
        store
    }

    #[test]
    fn removing_a_node_prunes_adjacent_edges() {
        let mut store = two_node_store();
        assert!(store.remove_node("csv_1"));
        assert_eq!(store.edge_count(), 0);
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn removing_an_absent_node_is_a_no_op() {
        let mut store = two_node_store();
        assert!(!store.remove_node("ghost"));
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn snapshot_is_isolated_from_later_edits() {
        let mut store = two_node_store();
        let snapshot = store.snapshot();
        store.remove_node("pca_1");
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.algorithm_ids(), vec!["pca_1".to_string()]);
    }

    #[test]
    fn alignment_reset_visits_only_image_nodes() {
        let mut store = two_node_store();
        let skewed = ImageAlignment::new("frame_000").with_position(Axes::new(2.0, 0.5, 0.0));
        store.insert_node(PipelineNode::image(
            "img_1",
            "stack",
            ImageParams::default().with_alignments(vec![skewed]),
        ));

        assert_eq!(store.reset_alignments(), 1);
        assert_eq!(store.reset_alignments(), 1);

        let NodeData::Image(params) = store.node("img_1").unwrap().data() else {
            panic!("img_1 keeps its variant");
        };
        assert!(params.alignments[0].is_reset());
        assert_eq!(params.alignments[0].image_id(), "frame_000");
    }

    #[test]
    fn upload_to_unknown_node_errors() {
        let mut store = two_node_store();
        let err = store.upload_completed("ghost", "x.csv").unwrap_err();
        assert!(matches!(err, StoreError::UnknownNode { .. }));
    }

    #[test]
    fn upload_to_algorithm_node_errors() {
        let mut store = two_node_store();
        let err = store.upload_completed("pca_1", "x.csv").unwrap_err();
        assert!(matches!(err, StoreError::NotAnInput { .. }));
    }
}

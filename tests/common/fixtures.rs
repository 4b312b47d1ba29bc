#![allow(dead_code)]

use rustc_hash::FxHashMap;

use skein::experiment::{StoredExperiment, StoredFunction};
use skein::graph::{AlgorithmParams, CsvParams, GraphEdge, ImageParams, PipelineNode};
use skein::run::{NodeResult, RunOrchestrator};
use skein::types::NodeId;

/// `csv_1 -> pca_1`: one input, one algorithm. The smallest graph that
/// actually polls.
pub fn seed_two_node_graph(orchestrator: &RunOrchestrator) {
    orchestrator.insert_node(PipelineNode::csv(
        "csv_1",
        "behavior table",
        CsvParams::default(),
    ));
    orchestrator.insert_node(PipelineNode::algorithm(
        "pca_1",
        "pca",
        AlgorithmParams::new("dimension_reduction/pca"),
    ));
    orchestrator.insert_edge("e1", GraphEdge::new("csv_1", "pca_1"));
}

/// `img_1 -> mc_1 -> {roi_1, pca_1}`: three algorithms, so resolution can
/// arrive spread over several poll cycles.
pub fn seed_branching_graph(orchestrator: &RunOrchestrator) {
    orchestrator.insert_node(PipelineNode::image(
        "img_1",
        "raw stack",
        ImageParams::default(),
    ));
    orchestrator.insert_node(PipelineNode::algorithm(
        "mc_1",
        "motion correction",
        AlgorithmParams::new("caiman/caiman_mc"),
    ));
    orchestrator.insert_node(PipelineNode::algorithm(
        "roi_1",
        "roi detection",
        AlgorithmParams::new("suite2p/suite2p_roi"),
    ));
    orchestrator.insert_node(PipelineNode::algorithm(
        "pca_1",
        "pca",
        AlgorithmParams::new("dimension_reduction/pca"),
    ));
    orchestrator.insert_edge("e1", GraphEdge::new("img_1", "mc_1"));
    orchestrator.insert_edge("e2", GraphEdge::new("mc_1", "roi_1"));
    orchestrator.insert_edge("e3", GraphEdge::new("mc_1", "pca_1"));
}

/// Build the partial map a poll cycle delivers.
pub fn delivery(entries: &[(&str, NodeResult)]) -> FxHashMap<NodeId, NodeResult> {
    entries
        .iter()
        .map(|(id, result)| ((*id).to_string(), result.clone()))
        .collect()
}

fn stored_graph() -> (
    FxHashMap<NodeId, PipelineNode>,
    FxHashMap<String, GraphEdge>,
) {
    let mut nodes = FxHashMap::default();
    nodes.insert(
        "csv_1".to_string(),
        PipelineNode::csv("csv_1", "behavior table", CsvParams::default()),
    );
    nodes.insert(
        "mc_1".to_string(),
        PipelineNode::algorithm("mc_1", "motion correction", AlgorithmParams::new("caiman/caiman_mc")),
    );
    nodes.insert(
        "pca_1".to_string(),
        PipelineNode::algorithm("pca_1", "pca", AlgorithmParams::new("dimension_reduction/pca")),
    );
    let mut edges = FxHashMap::default();
    edges.insert("e1".to_string(), GraphEdge::new("csv_1", "mc_1"));
    edges.insert("e2".to_string(), GraphEdge::new("mc_1", "pca_1"));
    (nodes, edges)
}

/// A record fetched mid-run: `mc_1` already succeeded, `pca_1` still
/// running. Importing it must resume polling for exactly `pca_1`.
pub fn stored_record_running(uid: &str) -> StoredExperiment {
    let (nodes, edges) = stored_graph();
    let mut functions = FxHashMap::default();
    functions.insert(
        "mc_1".to_string(),
        StoredFunction::succeeded("motion correction", "motion corrected"),
    );
    functions.insert("pca_1".to_string(), StoredFunction::running("pca"));
    StoredExperiment {
        unique_id: uid.to_string(),
        name: "spont_activity_01".to_string(),
        started_at: Some("2024-11-02 09:15:00".to_string()),
        finished_at: None,
        success: Some("running".to_string()),
        functions,
        nodes,
        edges,
    }
}

/// A fully settled record: one success, one error. Importing it finishes
/// immediately with the error retained.
pub fn stored_record_settled(uid: &str) -> StoredExperiment {
    let (nodes, edges) = stored_graph();
    let mut functions = FxHashMap::default();
    functions.insert(
        "mc_1".to_string(),
        StoredFunction::succeeded("motion correction", "motion corrected"),
    );
    functions.insert(
        "pca_1".to_string(),
        StoredFunction::failed("pca", "matrix diverged"),
    );
    StoredExperiment {
        unique_id: uid.to_string(),
        name: "spont_activity_01".to_string(),
        started_at: Some("2024-11-02 09:15:00".to_string()),
        finished_at: Some("2024-11-02 09:40:12".to_string()),
        success: Some("error".to_string()),
        functions,
        nodes,
        edges,
    }
}

/// A record the service wrote with a node state this crate does not know.
pub fn stored_record_corrupt(uid: &str) -> StoredExperiment {
    let mut record = stored_record_running(uid);
    record
        .functions
        .get_mut("pca_1")
        .expect("fixture has pca_1")
        .success = "paused".to_string();
    record
}

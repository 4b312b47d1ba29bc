//! Pipeline graph nodes and their per-node configuration.
//!
//! A composed graph mixes *input* nodes (CSV tables, HDF5 files, image
//! stacks), which carry resolved file paths and parse parameters, with
//! *algorithm* nodes, which name a service-side function and its parameters.
//! The variant of a node is fixed at creation; only its parameters and
//! resolved paths mutate afterwards.
//!
//! Algorithm nodes are the ones the service executes and reports on: their
//! ids form the pending set when a run launches. Input nodes resolve
//! immediately server-side and are never polled.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::NodeId;
use crate::utils::paths::normalize_separators;

use super::alignment::ImageAlignment;

/// Parse configuration for a CSV input node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvParams {
    /// Row index to treat as the header, if any.
    pub header: Option<u32>,
    /// Use the first column as the index column.
    pub set_index: bool,
    /// Transpose the table after parsing.
    pub transpose: bool,
    /// Resolved file path; set by upload completion.
    pub path: Option<String>,
}

impl CsvParams {
    #[must_use]
    pub fn with_header(mut self, header: u32) -> Self {
        self.header = Some(header);
        self
    }

    #[must_use]
    pub fn with_set_index(mut self, set_index: bool) -> Self {
        self.set_index = set_index;
        self
    }

    #[must_use]
    pub fn with_transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }
}

/// Configuration for an HDF5 input node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hdf5Params {
    /// Dataset path inside the file (e.g. `"/acquisition/movie"`).
    pub dataset: Option<String>,
    /// Resolved file path; set by upload completion.
    pub path: Option<String>,
}

impl Hdf5Params {
    #[must_use]
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }
}

/// Configuration for an image-stack input node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    /// Per-image registration parameters.
    pub alignments: Vec<ImageAlignment>,
    /// Resolved file paths, in upload order.
    pub paths: Vec<String>,
}

impl ImageParams {
    #[must_use]
    pub fn with_alignments(mut self, alignments: Vec<ImageAlignment>) -> Self {
        self.alignments = alignments;
        self
    }
}

/// Configuration for an algorithm node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmParams {
    /// Service-side function path (e.g. `"caiman/caiman_mc"`).
    pub function: String,
    /// Free-form algorithm parameters, passed through to the service.
    pub params: FxHashMap<String, Value>,
}

impl AlgorithmParams {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            params: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Variant-specific payload of a pipeline node.
///
/// The variant is fixed when the node is created. Input variants accept
/// upload completions; the algorithm variant does not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeData {
    Csv(CsvParams),
    Hdf5(Hdf5Params),
    Image(ImageParams),
    Algorithm(AlgorithmParams),
}

impl NodeData {
    /// Short label for logs and events.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            NodeData::Csv(_) => "csv",
            NodeData::Hdf5(_) => "hdf5",
            NodeData::Image(_) => "image",
            NodeData::Algorithm(_) => "algorithm",
        }
    }

    /// Input nodes carry resolved paths; algorithm nodes do not.
    #[must_use]
    pub fn is_input(&self) -> bool {
        !matches!(self, NodeData::Algorithm(_))
    }

    #[must_use]
    pub fn is_algorithm(&self) -> bool {
        matches!(self, NodeData::Algorithm(_))
    }

    /// Resolved file paths in order: zero or one for single-path variants,
    /// the full list for image stacks, nothing for algorithm nodes.
    #[must_use]
    pub fn resolved_paths(&self) -> Vec<&str> {
        match self {
            NodeData::Csv(p) => p.path.as_deref().into_iter().collect(),
            NodeData::Hdf5(p) => p.path.as_deref().into_iter().collect(),
            NodeData::Image(p) => p.paths.iter().map(String::as_str).collect(),
            NodeData::Algorithm(_) => Vec::new(),
        }
    }

    /// Record a completed upload. Single-path variants replace any earlier
    /// path; image stacks append. Returns `false` for variants that take no
    /// uploads, leaving the caller to surface the error.
    pub(crate) fn record_upload(&mut self, path: &str) -> bool {
        let path = normalize_separators(path);
        match self {
            NodeData::Csv(p) => {
                if let Some(previous) = p.path.replace(path) {
                    debug!(previous, "replaced resolved csv path");
                }
                true
            }
            NodeData::Hdf5(p) => {
                if let Some(previous) = p.path.replace(path) {
                    debug!(previous, "replaced resolved hdf5 path");
                }
                true
            }
            NodeData::Image(p) => {
                p.paths.push(path);
                true
            }
            NodeData::Algorithm(_) => false,
        }
    }
}

/// A node of the composed pipeline graph.
///
/// # Examples
///
/// ```rust
/// use skein::graph::{CsvParams, PipelineNode};
///
/// let node = PipelineNode::csv("csv_1", "behavior", CsvParams::default().with_transpose(true));
/// assert!(node.data().is_input());
/// assert!(node.data().resolved_paths().is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
    id: NodeId,
    label: String,
    data: NodeData,
}

impl PipelineNode {
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>, data: NodeData) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data,
        }
    }

    pub fn csv(id: impl Into<NodeId>, label: impl Into<String>, params: CsvParams) -> Self {
        Self::new(id, label, NodeData::Csv(params))
    }

    pub fn hdf5(id: impl Into<NodeId>, label: impl Into<String>, params: Hdf5Params) -> Self {
        Self::new(id, label, NodeData::Hdf5(params))
    }

    pub fn image(id: impl Into<NodeId>, label: impl Into<String>, params: ImageParams) -> Self {
        Self::new(id, label, NodeData::Image(params))
    }

    pub fn algorithm(
        id: impl Into<NodeId>,
        label: impl Into<String>,
        params: AlgorithmParams,
    ) -> Self {
        Self::new(id, label, NodeData::Algorithm(params))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut NodeData {
        &mut self.data
    }

    /// Zero the alignment parameters if this is an image node.
    /// Returns `true` when the node was an image node.
    pub(crate) fn reset_alignments(&mut self) -> bool {
        match &mut self.data {
            NodeData::Image(params) => {
                for alignment in &mut params.alignments {
                    alignment.reset();
                }
                true
            }
            _ => false,
        }
    }
}

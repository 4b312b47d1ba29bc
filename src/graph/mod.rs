//! The composed pipeline graph: nodes, edges, alignments, and the store.
//!
//! Everything here is plain data plus bookkeeping. Launching, polling, and
//! status live in [`crate::run`]; this module only answers "what would we
//! submit right now?" via [`GraphStore::snapshot`].

pub mod alignment;
pub mod node;
pub mod store;

pub use alignment::{Axes, ImageAlignment};
pub use node::{AlgorithmParams, CsvParams, Hdf5Params, ImageParams, NodeData, PipelineNode};
pub use store::{GraphEdge, GraphSnapshot, GraphStore, StoreError};

/*!
Stored experiment records: the serde-friendly shapes the execution service
returns for past runs, and their conversion back into live run state.

Design goals:
- Keep wire shapes decoupled from in-memory state; conversion lives here as
  fallible, localized functions so the orchestrator stays declarative.
- Timestamps stay strings in the serialized shape (the service emits both
  RFC 3339 and its older `"%Y-%m-%d %H:%M:%S"` form); accessors parse on
  demand.
- Reconstruction fails loudly: an unrecognized stored node state is an
  error, never a silent pending.

This module performs no I/O. Fetching records is the client's job.
*/

use chrono::{DateTime, NaiveDateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{GraphEdge, PipelineNode};
use crate::run::{NodeResult, OutputPath, RunResultMap};
use crate::types::{NodeId, RunId};

/// Stored node states the service writes into experiment records.
const STATE_RUNNING: &str = "running";
const STATE_SUCCESS: &str = "success";
const STATE_ERROR: &str = "error";

/// Conversion failures from stored records into run state.
#[derive(Debug, Error, Diagnostic)]
pub enum ExperimentError {
    #[error("unknown stored state {value:?} for node {node_id}")]
    #[diagnostic(
        code(skein::experiment::unknown_state),
        help("stored records use exactly: running, success, error")
    )]
    UnknownState { node_id: NodeId, value: String },

    #[error("stored experiment {uid} has an empty unique id")]
    #[diagnostic(code(skein::experiment::missing_uid))]
    MissingUid { uid: String },
}

/// Per-function (algorithm node) outcome inside a stored record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFunction {
    pub name: String,
    /// `"running"`, `"success"`, or `"error"`.
    pub success: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "outputPaths")]
    pub output_paths: FxHashMap<String, OutputPath>,
}

impl StoredFunction {
    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: STATE_RUNNING.into(),
            message: None,
            output_paths: FxHashMap::default(),
        }
    }

    pub fn succeeded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: STATE_SUCCESS.into(),
            message: Some(message.into()),
            output_paths: FxHashMap::default(),
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: STATE_ERROR.into(),
            message: Some(message.into()),
            output_paths: FxHashMap::default(),
        }
    }
}

/// A stored experiment record, as fetched from the service.
///
/// `function` keeps the service's singular field name: the dictionary of
/// per-algorithm-node outcomes, keyed by node id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredExperiment {
    pub unique_id: String,
    pub name: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    /// Overall label the service last wrote (`running`/`success`/`error`).
    #[serde(default)]
    pub success: Option<String>,
    #[serde(default, rename = "function")]
    pub functions: FxHashMap<NodeId, StoredFunction>,
    #[serde(default, rename = "nodeDict")]
    pub nodes: FxHashMap<NodeId, PipelineNode>,
    #[serde(default, rename = "edgeDict")]
    pub edges: FxHashMap<String, GraphEdge>,
}

impl StoredExperiment {
    /// The run identifier this record was stored under.
    pub fn run_id(&self) -> Result<RunId, ExperimentError> {
        if self.unique_id.trim().is_empty() {
            return Err(ExperimentError::MissingUid {
                uid: self.unique_id.clone(),
            });
        }
        Ok(RunId::new(self.unique_id.clone()))
    }

    /// Parse `started_at`, accepting RFC 3339 or the service's older
    /// `"%Y-%m-%d %H:%M:%S"` form (read as UTC).
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at.as_deref().and_then(parse_timestamp)
    }

    /// Parse `finished_at`; see [`started_at`](Self::started_at).
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at.as_deref().and_then(parse_timestamp)
    }

    /// Rebuild the run-wide result map from the stored per-function
    /// outcomes. `running` maps back to pending, so a record fetched
    /// mid-run resumes polling for exactly the unresolved nodes.
    pub fn reconstruct_results(&self) -> Result<RunResultMap, ExperimentError> {
        let mut entries = FxHashMap::default();
        for (node_id, function) in &self.functions {
            let result = match function.success.as_str() {
                STATE_RUNNING => NodeResult::Pending,
                STATE_SUCCESS => NodeResult::success_with_outputs(
                    function.message.clone().unwrap_or_default(),
                    function.output_paths.clone(),
                ),
                STATE_ERROR => NodeResult::error(
                    function
                        .message
                        .clone()
                        .unwrap_or_else(|| "node failed".to_string()),
                ),
                other => {
                    return Err(ExperimentError::UnknownState {
                        node_id: node_id.clone(),
                        value: other.to_string(),
                    });
                }
            };
            entries.insert(node_id.clone(), result);
        }
        Ok(RunResultMap::from_entries(entries))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

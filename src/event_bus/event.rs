//! Structured events the orchestrator publishes.
//!
//! Three shapes cover everything a rendering layer needs: run-level phase
//! changes, per-node resolutions (the incremental completion feed), and
//! free-form diagnostics (stale discards, poll retries, import notes).
//! Run and node events are stamped with the run identifier they belong to.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::run::RunStatus;
use crate::types::{NodeId, RunId};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Event {
    Run(RunPhaseEvent),
    Node(NodeResolvedEvent),
    Diagnostic(DiagnosticEvent),
}

impl Event {
    /// Run-level phase change. `run_id` is absent for phases that have no
    /// identifier yet (`pending`, a rejected launch).
    pub fn phase(run_id: Option<RunId>, status: RunStatus, detail: impl Into<String>) -> Self {
        Event::Run(RunPhaseEvent {
            run_id,
            status,
            detail: detail.into(),
        })
    }

    /// One node went from pending to resolved.
    pub fn node_resolved(
        run_id: RunId,
        node_id: impl Into<NodeId>,
        outcome: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Node(NodeResolvedEvent {
            run_id,
            node_id: node_id.into(),
            outcome: outcome.into(),
            message: message.into(),
        })
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            Event::Run(_) => Some("run"),
            Event::Node(_) => Some("node"),
            Event::Diagnostic(diag) => Some(diag.scope()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Event::Run(run) => &run.detail,
            Event::Node(node) => &node.message,
            Event::Diagnostic(diag) => diag.message(),
        }
    }

    /// Convert to a normalized JSON object:
    ///
    /// ```json
    /// {
    ///   "type": "run" | "node" | "diagnostic",
    ///   "scope": "...",
    ///   "message": "...",
    ///   "timestamp": "2025-11-03T12:34:56.789Z",
    ///   "metadata": { /* variant-specific fields */ }
    /// }
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use skein::event_bus::Event;
    /// use skein::run::RunStatus;
    /// use skein::types::RunId;
    ///
    /// let event = Event::phase(Some(RunId::new("r1")), RunStatus::Success, "seeded 3 nodes");
    /// let json = event.to_json_value();
    /// assert_eq!(json["type"], "run");
    /// assert_eq!(json["metadata"]["run_id"], "r1");
    /// assert_eq!(json["metadata"]["status"], "success");
    /// ```
    pub fn to_json_value(&self) -> Value {
        use serde_json::json;

        let (event_type, metadata) = match self {
            Event::Run(run) => {
                let mut meta = serde_json::Map::new();
                if let Some(run_id) = &run.run_id {
                    meta.insert("run_id".to_string(), json!(run_id.as_str()));
                }
                meta.insert("status".to_string(), json!(run.status.to_string()));
                ("run", Value::Object(meta))
            }
            Event::Node(node) => {
                let mut meta = serde_json::Map::new();
                meta.insert("run_id".to_string(), json!(node.run_id.as_str()));
                meta.insert("node_id".to_string(), json!(node.node_id));
                meta.insert("outcome".to_string(), json!(node.outcome));
                ("node", Value::Object(meta))
            }
            Event::Diagnostic(_) => ("diagnostic", Value::Object(serde_json::Map::new())),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": Utc::now().to_rfc3339(),
            "metadata": metadata,
        })
    }

    /// Compact JSON string form of [`to_json_value`](Self::to_json_value).
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Run(run) => match &run.run_id {
                Some(run_id) => write!(f, "[run {run_id}] {}: {}", run.status, run.detail),
                None => write!(f, "[run] {}: {}", run.status, run.detail),
            },
            Event::Node(node) => write!(
                f,
                "[{}@{}] {}: {}",
                node.node_id, node.run_id, node.outcome, node.message
            ),
            Event::Diagnostic(diag) => write!(f, "{}", diag.message()),
        }
    }
}

/// Run-level lifecycle change.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunPhaseEvent {
    pub run_id: Option<RunId>,
    pub status: RunStatus,
    pub detail: String,
}

/// A node resolved (success or error) during polling or import.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeResolvedEvent {
    pub run_id: RunId,
    pub node_id: NodeId,
    /// `"success"` or `"error"`.
    pub outcome: String,
    pub message: String,
}

/// Free-form diagnostic, scoped for filtering.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

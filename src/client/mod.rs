//! The seam to the remote execution service.
//!
//! Everything the orchestrator asks of the outside world goes through
//! [`ExecutionClient`]: launching a run, re-launching under an existing
//! identifier, polling for per-node results, and fetching stored experiment
//! records. The orchestrator never constructs a transport itself, which is
//! what keeps the whole state machine testable against the in-memory
//! implementation.
//!
//! # Implementations
//!
//! - [`HttpExecutionClient`] — reqwest against the service's REST surface
//! - [`InMemoryExecutionService`] — scripted in-process double for tests
//!   and local development

pub mod http;
pub mod memory;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::experiment::StoredExperiment;
use crate::run::{NodeResult, RunRequest};
use crate::types::{NodeId, RunId};

pub use http::{HttpClientConfig, HttpExecutionClient};
pub use memory::{InMemoryExecutionService, PollStep};

/// Failures at the service seam.
#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("transport failure talking to the execution service")]
    #[diagnostic(
        code(skein::client::transport),
        help("check the service base url and that the service is reachable")
    )]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("execution service rejected the request: {status} {body}")]
    #[diagnostic(code(skein::client::rejected))]
    Rejected { status: u16, body: String },

    /// The response body did not parse. Deliberately loud: an unrecognized
    /// per-node status dialect must fail the operation, not stall the run.
    #[error("malformed payload from the execution service")]
    #[diagnostic(
        code(skein::client::malformed),
        help("the service and client disagree on the wire format; compare service versions")
    )]
    Malformed {
        #[source]
        source: serde_json::Error,
    },

    /// No stored experiment under that uid.
    #[error("no stored experiment with uid {uid}")]
    #[diagnostic(code(skein::client::not_found))]
    NotFound { uid: String },
}

impl ClientError {
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        ClientError::Rejected {
            status,
            body: body.into(),
        }
    }
}

/// Async contract with the execution service.
///
/// `poll` takes the list of still-pending node ids (the service only
/// answers for nodes whose state changed) and returns a partial map for the
/// merge step.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Submit a brand-new run; the service assigns and returns its id.
    async fn launch(&self, request: &RunRequest) -> Result<RunId, ClientError>;

    /// Re-run under an existing identifier (after an import), honoring the
    /// request's force-rerun list.
    async fn relaunch(&self, run_id: &RunId, request: &RunRequest) -> Result<RunId, ClientError>;

    /// One poll cycle: report outcomes for any of `pending` that changed.
    async fn poll(
        &self,
        run_id: &RunId,
        pending: &[NodeId],
    ) -> Result<FxHashMap<NodeId, NodeResult>, ClientError>;

    /// Fetch the stored record of a past run.
    async fn fetch_experiment(&self, uid: &str) -> Result<StoredExperiment, ClientError>;
}

//! # Skein: client-side run orchestration for remote pipeline graphs
//!
//! Skein tracks the lifecycle of a data-processing pipeline executed by a
//! remote service: submit a node/edge graph, poll for per-node results,
//! merge partial completions into an append-only result map, and keep the
//! caller-facing surface (run status, run-button mode, pending node set)
//! consistent under cancellation, re-runs, and stored-experiment imports.
//!
//! ## Core Concepts
//!
//! - **Graph store**: the editable pipeline - input nodes (csv, hdf5,
//!   image) and algorithm nodes joined by edges
//! - **Run state machine**: a tagged union of lifecycle states mutated by
//!   exactly one pure transition rule
//! - **Result map**: per-node outcomes that only ever move from pending to
//!   resolved; late or duplicate reports cannot demote a node
//! - **Execution client**: the async seam to the remote service, with an
//!   HTTP implementation and a scripted in-memory one
//! - **Poller**: a cancellable scheduled task that feeds stamped poll
//!   outcomes back into the machine
//! - **Orchestrator**: one per session, owning all of the above
//!
//! ## Quick Start
//!
//! ### The state machine alone
//!
//! The lifecycle logic is synchronous and side-effect free, so it can be
//! driven directly:
//!
//! ```
//! use rustc_hash::FxHashMap;
//! use skein::run::{NodeResult, RunEvent, RunResultMap, RunState, RunStatus, transition};
//! use skein::types::RunId;
//!
//! // A reconstructed run with two unresolved nodes is still in flight...
//! let state = transition(
//!     RunState::Uninitialized,
//!     RunEvent::ExperimentLoaded {
//!         run_id: RunId::new("1a2b3c4d"),
//!         results: RunResultMap::seeded(["pca_1", "suite2p_roi_1"]),
//!     },
//! );
//! assert_eq!(state.status(), RunStatus::Success);
//!
//! // ...and finishes the moment the last pending node resolves, even if
//! // that resolution is an error: per-node failures never end a run early.
//! let mut partial = FxHashMap::default();
//! partial.insert("pca_1".to_string(), NodeResult::success("completed"));
//! partial.insert("suite2p_roi_1".to_string(), NodeResult::error("out of memory"));
//! let state = transition(
//!     state,
//!     RunEvent::PollDelivered {
//!         run_id: RunId::new("1a2b3c4d"),
//!         partial,
//!     },
//! );
//! assert_eq!(state.status(), RunStatus::Finished);
//! ```
//!
//! ### A full session
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use skein::client::{HttpClientConfig, HttpExecutionClient};
//! use skein::config::OrchestratorConfig;
//! use skein::graph::{AlgorithmParams, CsvParams, GraphEdge, PipelineNode};
//! use skein::run::{RunOrchestrator, SubmitOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! skein::telemetry::init();
//!
//! let client = Arc::new(HttpExecutionClient::new(HttpClientConfig::from_env())?);
//! let orchestrator = RunOrchestrator::with_config(client, OrchestratorConfig::from_env());
//!
//! orchestrator.insert_node(PipelineNode::csv("csv_1", "traces", CsvParams::default()));
//! orchestrator.insert_node(PipelineNode::algorithm(
//!     "pca_1",
//!     "pca",
//!     AlgorithmParams::new("dimension_reduction/pca"),
//! ));
//! orchestrator.insert_edge("e1", GraphEdge::new("csv_1", "pca_1"));
//!
//! let run_id = orchestrator.start_run(SubmitOptions::named("spont_pca")).await?;
//! println!("run {run_id} submitted; polling in the background");
//! # Ok(())
//! # }
//! ```
//!
//! The orchestrator polls in the background and publishes progress on its
//! event bus; `cancel()`, `rerun_current()`, and `import_experiment()` are
//! always one call away and leave the state machine consistent.
//!
//! ## Module Guide
//!
//! - [`graph`] - pipeline nodes, edges, and the editable store
//! - [`run`] - run status, state machine, results, requests, orchestrator
//! - [`client`] - the `ExecutionClient` seam plus HTTP and in-memory impls
//! - [`experiment`] - stored experiment records and reconstruction
//! - [`event_bus`] - orchestration events fanned out to pluggable sinks
//! - [`config`] - poll cadence and event bus wiring
//! - [`telemetry`] - tracing subscriber setup and event formatting
//! - [`types`] - run identifiers and the pipeline binding

pub mod client;
pub mod config;
pub mod event_bus;
pub mod experiment;
pub mod graph;
pub mod run;
pub mod telemetry;
pub mod types;
pub mod utils;

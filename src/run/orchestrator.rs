//! The caller-facing facade: one `RunOrchestrator` per pipeline session.
//!
//! # Architecture: state machine vs orchestrator
//!
//! - [`transition`]: the pure rule set (state, event) -> state
//! - [`RunOrchestrator`]: the runtime around it (client calls, the poll
//!   task, the event bus, the graph store)
//!
//! Every mutation is serialized through a single internal lock around the
//! graph store, the run state, and the pipeline binding. The lock is never
//! held across an await: client calls happen unlocked, and their outcomes
//! re-enter the state machine as stamped events, so whatever happened in
//! the meantime (a cancel, a newer run) wins by the staleness rule rather
//! than by lock discipline.

use std::sync::{Arc, Mutex, MutexGuard};

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::client::{ClientError, ExecutionClient};
use crate::config::{OrchestratorConfig, PollPolicy};
use crate::event_bus::{Event, EventBus, EventEmitter, EventStream, MemorySink};
use crate::experiment::{ExperimentError, StoredExperiment};
use crate::graph::{GraphEdge, GraphSnapshot, GraphStore, PipelineNode, StoreError};
use crate::types::{NodeId, PipelineUid, RunId};

use super::machine::{RunEvent, transition};
use super::poller::{PollHandle, PollVerdict, spawn_poller};
use super::request::{RequestError, RunRequestBuilder, SubmitOptions};
use super::result::RunResultMap;
use super::state::RunState;
use super::status::{RunButtonMode, RunStatus};

#[derive(Debug, Error, Diagnostic)]
pub enum OrchestratorError {
    #[error("a run submission is already awaiting acknowledgment")]
    #[diagnostic(
        code(skein::orchestrator::submission_locked),
        help("Wait for the acknowledgment or cancel the run.")
    )]
    SubmissionLocked,

    #[error("a run is already active")]
    #[diagnostic(
        code(skein::orchestrator::run_in_progress),
        help("Cancel the active run before submitting a new one.")
    )]
    RunInProgress,

    #[error("another exclusive operation is in flight")]
    #[diagnostic(code(skein::orchestrator::operation_in_flight))]
    OperationInFlight,

    #[error("no run identifier is bound to this session")]
    #[diagnostic(
        code(skein::orchestrator::no_bound_experiment),
        help("Launch a new run or import a stored experiment first.")
    )]
    NoBoundExperiment,

    #[error("run submission failed: {message}")]
    #[diagnostic(code(skein::orchestrator::launch_rejected))]
    Launch { message: String },

    #[error(transparent)]
    #[diagnostic(code(skein::orchestrator::request))]
    Request(#[from] RequestError),

    #[error(transparent)]
    #[diagnostic(code(skein::orchestrator::store))]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(code(skein::orchestrator::client))]
    Client(#[from] ClientError),

    #[error(transparent)]
    #[diagnostic(code(skein::orchestrator::experiment))]
    Experiment(#[from] ExperimentError),
}

/// Everything the internal lock protects.
struct Core {
    graph: GraphStore,
    run: RunState,
    binding: PipelineUid,
    /// True while an exclusive operation (launch, fetch) is between its
    /// first lock and its concluding lock.
    busy: bool,
    poller: Option<PollHandle>,
}

/// Run orchestration for one pipeline session.
///
/// Owns the graph store being edited, the run state machine, the pipeline
/// binding, the event bus, and at most one live poll task. Construct one
/// per session and keep it for the session's lifetime; dropping it revokes
/// any live poller and stops the event listener.
///
/// # Usage
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use skein::client::InMemoryExecutionService;
/// use skein::config::OrchestratorConfig;
/// use skein::graph::{AlgorithmParams, PipelineNode};
/// use skein::run::{RunOrchestrator, SubmitOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = Arc::new(InMemoryExecutionService::new());
/// let orchestrator = RunOrchestrator::with_config(
///     service,
///     OrchestratorConfig::default().with_memory_event_bus(),
/// );
///
/// orchestrator.insert_node(PipelineNode::algorithm(
///     "suite2p_roi_1",
///     "suite2p_roi",
///     AlgorithmParams::new("suite2p/suite2p_roi"),
/// ));
///
/// let run_id = orchestrator.start_run(SubmitOptions::named("demo")).await?;
/// println!("run {run_id} accepted");
/// # Ok(())
/// # }
/// ```
///
/// Constructors spawn the event listener, so they must be called from
/// within a Tokio runtime.
pub struct RunOrchestrator {
    client: Arc<dyn ExecutionClient>,
    core: Arc<Mutex<Core>>,
    event_bus: EventBus,
    emitter: EventEmitter,
    poll_policy: PollPolicy,
}

impl RunOrchestrator {
    /// Orchestrator with default configuration (stdout events, default
    /// poll cadence).
    #[must_use]
    pub fn new(client: Arc<dyn ExecutionClient>) -> Self {
        Self::with_config(client, OrchestratorConfig::default())
    }

    #[must_use]
    pub fn with_config(client: Arc<dyn ExecutionClient>, config: OrchestratorConfig) -> Self {
        let event_bus = EventBus::from_config(&config.event_bus);
        event_bus.listen_for_events();
        let emitter = event_bus.emitter();
        Self {
            client,
            core: Arc::new(Mutex::new(Core {
                graph: GraphStore::new(),
                run: RunState::default(),
                binding: PipelineUid::default(),
                busy: false,
                poller: None,
            })),
            event_bus,
            emitter,
            poll_policy: config.poll,
        }
    }

    // ---------------- submissions ----------------

    /// Submit a brand-new run built from a snapshot of the current graph.
    ///
    /// The pipeline binding is cleared first: a new run never continues a
    /// previously imported experiment. Rejected while a submission is
    /// already pending (`SubmissionLocked`), while a run is actively
    /// polling (`RunInProgress`), or while a fetch is in flight
    /// (`OperationInFlight`).
    #[instrument(skip(self, options), fields(name = %options.name), err)]
    pub async fn start_run(&self, options: SubmitOptions) -> Result<RunId, OrchestratorError> {
        let request = {
            let mut core = self.lock_core();
            Self::guard_launchable(&core)?;
            let request = RunRequestBuilder::new(options)
                .with_snapshot(core.graph.snapshot())
                .build()?;
            core.binding = PipelineUid::default();
            core.busy = true;
            Self::apply(
                &mut core,
                &self.emitter,
                RunEvent::Launch {
                    request: request.clone(),
                },
            );
            request
        };

        let launched = self.client.launch(&request).await;
        self.conclude_submission(launched)
    }

    /// Re-run under the identifier already bound to this session, live or
    /// imported. Same guards as [`start_run`](Self::start_run), plus
    /// `NoBoundExperiment` when there is nothing to continue.
    #[instrument(skip(self, options), fields(name = %options.name), err)]
    pub async fn rerun_current(&self, options: SubmitOptions) -> Result<RunId, OrchestratorError> {
        let (target, request) = {
            let mut core = self.lock_core();
            Self::guard_launchable(&core)?;
            let Some(target) = Self::bound_identifier(&core) else {
                return Err(OrchestratorError::NoBoundExperiment);
            };
            let request = RunRequestBuilder::new(options)
                .with_snapshot(core.graph.snapshot())
                .build()?;
            core.busy = true;
            Self::apply(
                &mut core,
                &self.emitter,
                RunEvent::Relaunch {
                    request: request.clone(),
                },
            );
            (target, request)
        };

        let launched = self.client.relaunch(&target, &request).await;
        self.conclude_submission(launched)
    }

    /// Cancel whatever is in flight. Synchronous and infallible: revokes
    /// the poll task and applies `Cancel`, which terminal states absorb.
    /// Responses already in flight for the canceled run are discarded by
    /// their stamp when they land.
    pub fn cancel(&self) {
        let handle = {
            let mut core = self.lock_core();
            let handle = core.poller.take();
            Self::apply(&mut core, &self.emitter, RunEvent::Cancel);
            handle
        };
        if let Some(handle) = handle {
            handle.revoke();
        }
    }

    // ---------------- stored experiments ----------------

    /// Import the experiment stored under `uid`, replacing the session
    /// wholesale. The distinguished `default` identifier clears the
    /// binding and resets the run state without touching the client.
    #[instrument(skip(self), err)]
    pub async fn import_experiment(&self, uid: &str) -> Result<RunStatus, OrchestratorError> {
        if PipelineUid::decode(uid).is_default() {
            let mut core = self.lock_core();
            if core.busy {
                return Err(OrchestratorError::OperationInFlight);
            }
            core.poller = None;
            core.binding = PipelineUid::default();
            Self::apply(&mut core, &self.emitter, RunEvent::ExperimentCleared);
            return Ok(core.run.status());
        }
        self.fetch_experiment(uid).await
    }

    /// Fetch the experiment stored under `uid` and reconstruct run state,
    /// result map, graph, and binding from the record. A record with
    /// unresolved nodes resumes polling under the stored identifier; any
    /// failure resets the session to uninitialized rather than retaining
    /// a half-imported state.
    #[instrument(skip(self), err)]
    pub async fn fetch_experiment(&self, uid: &str) -> Result<RunStatus, OrchestratorError> {
        {
            let mut core = self.lock_core();
            if core.busy {
                return Err(OrchestratorError::OperationInFlight);
            }
            core.busy = true;
        }

        let fetched = self.client.fetch_experiment(uid).await;

        let mut core = self.lock_core();
        core.busy = false;
        core.poller = None;

        let stored = match fetched {
            Ok(stored) => stored,
            Err(err) => {
                Self::apply(&mut core, &self.emitter, RunEvent::LoadFailed);
                core.binding = PipelineUid::default();
                return Err(err.into());
            }
        };

        match Self::reconstruct(&stored) {
            Ok((run_id, results)) => {
                let StoredExperiment {
                    unique_id,
                    nodes,
                    edges,
                    ..
                } = stored;
                core.graph.replace(nodes, edges);
                core.binding = PipelineUid::stored(unique_id);
                Self::apply(
                    &mut core,
                    &self.emitter,
                    RunEvent::ExperimentLoaded { run_id, results },
                );
                self.arm_poller(&mut core);
                info!(status = %core.run.status(), "experiment reconstructed");
                Ok(core.run.status())
            }
            Err(err) => {
                Self::apply(&mut core, &self.emitter, RunEvent::LoadFailed);
                core.binding = PipelineUid::default();
                Err(err.into())
            }
        }
    }

    // ---------------- graph store ----------------

    pub fn insert_node(&self, node: PipelineNode) {
        self.lock_core().graph.insert_node(node);
    }

    pub fn insert_edge(&self, edge_id: impl Into<String>, edge: GraphEdge) {
        self.lock_core().graph.insert_edge(edge_id, edge);
    }

    /// Record a finished file upload on an input node. Accepted regardless
    /// of run status: uploads are workspace edits, not run events.
    pub fn upload_completed(&self, node_id: &str, path: &str) -> Result<(), OrchestratorError> {
        self.lock_core().graph.upload_completed(node_id, path)?;
        Ok(())
    }

    /// Remove a node and its incident edges. `false` when the id was
    /// absent; removal is idempotent.
    pub fn remove_node(&self, node_id: &str) -> bool {
        self.lock_core().graph.remove_node(node_id)
    }

    /// Remove several nodes; returns how many actually existed.
    pub fn remove_nodes<I, S>(&self, node_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock_core().graph.remove_nodes(node_ids)
    }

    /// Reset every image alignment in the store; returns how many nodes
    /// were touched.
    pub fn reset_alignments(&self) -> usize {
        self.lock_core().graph.reset_alignments()
    }

    // ---------------- read side ----------------

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.lock_core().run.status()
    }

    #[must_use]
    pub fn run_id(&self) -> Option<RunId> {
        self.lock_core().run.run_id().cloned()
    }

    /// Cloned snapshot of the result map, in states that carry one.
    #[must_use]
    pub fn results(&self) -> Option<RunResultMap> {
        self.lock_core().run.results().cloned()
    }

    /// Ids still pending, sorted. Empty when no run carries a map.
    #[must_use]
    pub fn pending_nodes(&self) -> Vec<NodeId> {
        self.lock_core()
            .run
            .results()
            .map(RunResultMap::pending_ids)
            .unwrap_or_default()
    }

    /// Run-button mode derived from the current state and binding. Always
    /// recomputed, never stored.
    #[must_use]
    pub fn button_mode(&self) -> RunButtonMode {
        let core = self.lock_core();
        RunButtonMode::derive(&core.run, &core.binding)
    }

    #[must_use]
    pub fn binding(&self) -> PipelineUid {
        self.lock_core().binding.clone()
    }

    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<PipelineNode> {
        self.lock_core().graph.node(node_id).cloned()
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<PipelineNode> {
        self.lock_core().graph.nodes().cloned().collect()
    }

    #[must_use]
    pub fn graph_snapshot(&self) -> GraphSnapshot {
        self.lock_core().graph.snapshot()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.lock_core().graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.lock_core().graph.edge_count()
    }

    /// Handle to the in-memory event sink, when the configuration wired
    /// one. Useful for observing the event feed in tests.
    #[must_use]
    pub fn memory_events(&self) -> Option<MemorySink> {
        self.event_bus.memory_sink()
    }

    /// The underlying bus, for attaching additional sinks.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Live subscription to the event feed, starting at the next event.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        self.event_bus.subscribe()
    }

    // ---------------- internals ----------------

    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().expect("orchestrator state poisoned")
    }

    fn guard_launchable(core: &Core) -> Result<(), OrchestratorError> {
        match core.run.status() {
            RunStatus::Pending => Err(OrchestratorError::SubmissionLocked),
            RunStatus::Success => Err(OrchestratorError::RunInProgress),
            _ if core.busy => Err(OrchestratorError::OperationInFlight),
            _ => Ok(()),
        }
    }

    /// The identifier a re-run continues: the current run's, or the
    /// imported binding's when no run is live.
    fn bound_identifier(core: &Core) -> Option<RunId> {
        core.run
            .run_id()
            .cloned()
            .or_else(|| core.binding.uid().map(RunId::new))
    }

    fn reconstruct(stored: &StoredExperiment) -> Result<(RunId, RunResultMap), ExperimentError> {
        let run_id = stored.run_id()?;
        let results = stored.reconstruct_results()?;
        Ok((run_id, results))
    }

    /// Second half of a submission, entered once the client call returns.
    /// The state meanwhile may have moved (a cancel landed): acceptance of
    /// a canceled submission is absorbed by the machine and no poller is
    /// armed, because arming keys off the post-transition state.
    fn conclude_submission(
        &self,
        launched: Result<RunId, ClientError>,
    ) -> Result<RunId, OrchestratorError> {
        let mut core = self.lock_core();
        core.busy = false;
        match launched {
            Ok(run_id) => {
                Self::apply(
                    &mut core,
                    &self.emitter,
                    RunEvent::LaunchAccepted {
                        run_id: run_id.clone(),
                    },
                );
                self.arm_poller(&mut core);
                info!(run_id = %run_id, status = %core.run.status(), "submission acknowledged");
                Ok(run_id)
            }
            Err(err) => {
                let message = err.to_string();
                Self::apply(
                    &mut core,
                    &self.emitter,
                    RunEvent::LaunchRejected {
                        message: message.clone(),
                    },
                );
                Err(OrchestratorError::Launch { message })
            }
        }
    }

    /// Start (or stop) the poll task to match the current state: a task
    /// runs exactly while the state is `success`.
    fn arm_poller(&self, core: &mut Core) {
        core.poller = None;
        let RunState::Success { run_id, results } = &core.run else {
            return;
        };
        let pending = results.pending_ids();
        debug!(run_id = %run_id, pending = pending.len(), "arming poller");
        let handle = spawn_poller(
            Arc::clone(&self.client),
            run_id.clone(),
            self.poll_policy.clone(),
            pending,
            Self::poll_applier(
                Arc::clone(&self.core),
                self.emitter.clone(),
                run_id.clone(),
            ),
        );
        core.poller = Some(handle);
    }

    /// The callback a poll task hands its stamped outcomes to.
    fn poll_applier(
        core: Arc<Mutex<Core>>,
        emitter: EventEmitter,
        run_id: RunId,
    ) -> impl Fn(RunEvent) -> PollVerdict + Send + Sync + 'static {
        move |event| {
            let mut core = core.lock().expect("orchestrator state poisoned");
            let resolved = Self::apply(&mut core, &emitter, event);
            match &core.run {
                RunState::Success {
                    run_id: current,
                    results,
                } if *current == run_id => PollVerdict::Continue {
                    pending: results.pending_ids(),
                    made_progress: resolved > 0,
                },
                _ => PollVerdict::Stop,
            }
        }
    }

    /// Run one event through the state machine and publish what changed:
    /// a node event per id that left pending (when the run identifier
    /// survived the transition), a phase event when the status moved, and
    /// a diagnostic when a stamped poll outcome was discarded. Returns the
    /// number of nodes resolved by this event.
    fn apply(core: &mut Core, emitter: &EventEmitter, event: RunEvent) -> usize {
        let label = event.label();
        let discarded_poll = match &event {
            RunEvent::PollDelivered { run_id, .. } | RunEvent::PollFaulted { run_id, .. } => {
                !matches!(&core.run, RunState::Success { run_id: current, .. } if current == run_id)
            }
            _ => false,
        };
        let status_before = core.run.status();
        let run_before = core.run.run_id().cloned();
        let pending_before = core
            .run
            .results()
            .map(RunResultMap::pending_ids)
            .unwrap_or_default();

        let state = std::mem::take(&mut core.run);
        core.run = transition(state, event);

        let mut resolved = 0;
        if let Some(run_id) = &run_before
            && core.run.run_id() == Some(run_id)
            && let Some(results) = core.run.results()
        {
            for node_id in &pending_before {
                if let Some(node) = results.get(node_id)
                    && node.is_resolved()
                {
                    resolved += 1;
                    Self::emit(
                        emitter,
                        Event::node_resolved(
                            run_id.clone(),
                            node_id.clone(),
                            node.status_label(),
                            node.message(),
                        ),
                    );
                }
            }
        }

        let status_after = core.run.status();
        if status_after != status_before {
            let detail = phase_detail(label, &core.run);
            Self::emit(
                emitter,
                Event::phase(core.run.run_id().cloned(), status_after, detail),
            );
        }
        if discarded_poll {
            Self::emit(
                emitter,
                Event::diagnostic("poll", format!("stale {label} discarded")),
            );
        }
        resolved
    }

    fn emit(emitter: &EventEmitter, event: Event) {
        if let Err(err) = emitter.emit(event) {
            debug!(error = %err, "event bus closed; event dropped");
        }
    }
}

impl Drop for RunOrchestrator {
    fn drop(&mut self) {
        if let Ok(mut core) = self.core.lock() {
            core.poller.take();
        }
    }
}

/// Human detail line for a phase event, from the event label and the state
/// it produced.
fn phase_detail(label: &str, state: &RunState) -> String {
    match state {
        RunState::Uninitialized if label == "load_failed" => "experiment load failed".to_string(),
        RunState::Uninitialized => "workspace reset".to_string(),
        RunState::Pending { .. } => "submission in flight".to_string(),
        RunState::Success { results, .. } if label == "experiment_loaded" => {
            format!("experiment restored, {} nodes pending", results.pending_count())
        }
        RunState::Success { results, .. } => {
            format!("accepted, {} nodes pending", results.pending_count())
        }
        RunState::Finished { results, .. } => format!("all {} nodes resolved", results.len()),
        RunState::Aborted { message, .. } => format!("polling aborted: {message}"),
        RunState::Error { message } => message.clone(),
        RunState::Canceled { .. } => "canceled by caller".to_string(),
    }
}

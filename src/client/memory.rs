//! Scripted in-process implementation of [`ExecutionClient`].
//!
//! Useful for tests and local development: poll outcomes are queued ahead
//! of time, launches can be made to fail on demand, and every submitted
//! request is recorded for inspection. Run ids come out in the service's
//! own shape (eight uuid characters) so fixtures read like real traffic.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::experiment::StoredExperiment;
use crate::run::{NodeResult, RunRequest};
use crate::types::{NodeId, RunId};
use crate::utils::ids::IdGenerator;

use super::{ClientError, ExecutionClient};

/// One scripted poll cycle.
#[derive(Clone, Debug)]
pub enum PollStep {
    /// Answer with this partial map.
    Deliver(FxHashMap<NodeId, NodeResult>),
    /// Fail the cycle with a service-side error.
    Fault(String),
}

#[derive(Debug, Default)]
struct Script {
    reject_next_launch: Option<String>,
    poll_steps: VecDeque<PollStep>,
    experiments: FxHashMap<String, StoredExperiment>,
    launched: Vec<RunRequest>,
    polls_served: usize,
}

/// In-memory execution service double.
///
/// All scripting methods take `&self`; share it with the orchestrator via
/// `Arc` and keep a handle for scripting and assertions.
///
/// # Examples
///
/// ```rust
/// use rustc_hash::FxHashMap;
/// use skein::client::{InMemoryExecutionService, PollStep};
/// use skein::run::NodeResult;
///
/// let service = InMemoryExecutionService::new();
/// let mut batch = FxHashMap::default();
/// batch.insert("pca_1".to_string(), NodeResult::success("done"));
/// service.enqueue(PollStep::Deliver(batch));
/// assert_eq!(service.polls_served(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryExecutionService {
    script: Mutex<Script>,
    ids: IdGenerator,
}

impl InMemoryExecutionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `launch`/`relaunch` fail with this message.
    pub fn reject_next_launch(&self, message: impl Into<String>) {
        self.lock().reject_next_launch = Some(message.into());
    }

    /// Queue the next poll cycle's outcome. Cycles are consumed in order;
    /// an empty queue answers with an empty partial (nothing changed yet).
    pub fn enqueue(&self, step: PollStep) {
        self.lock().poll_steps.push_back(step);
    }

    /// Register a stored experiment record for `fetch_experiment`.
    pub fn insert_experiment(&self, experiment: StoredExperiment) {
        self.lock()
            .experiments
            .insert(experiment.unique_id.clone(), experiment);
    }

    /// Every request submitted so far, in order.
    #[must_use]
    pub fn launched_requests(&self) -> Vec<RunRequest> {
        self.lock().launched.clone()
    }

    /// How many poll cycles have been answered.
    #[must_use]
    pub fn polls_served(&self) -> usize {
        self.lock().polls_served
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("service script poisoned")
    }
}

#[async_trait]
impl ExecutionClient for InMemoryExecutionService {
    async fn launch(&self, request: &RunRequest) -> Result<RunId, ClientError> {
        let mut script = self.lock();
        if let Some(message) = script.reject_next_launch.take() {
            return Err(ClientError::rejected(422, message));
        }
        script.launched.push(request.clone());
        Ok(RunId::new(self.ids.generate_run_id()))
    }

    async fn relaunch(&self, run_id: &RunId, request: &RunRequest) -> Result<RunId, ClientError> {
        let mut script = self.lock();
        if let Some(message) = script.reject_next_launch.take() {
            return Err(ClientError::rejected(422, message));
        }
        script.launched.push(request.clone());
        Ok(run_id.clone())
    }

    async fn poll(
        &self,
        _run_id: &RunId,
        _pending: &[NodeId],
    ) -> Result<FxHashMap<NodeId, NodeResult>, ClientError> {
        let mut script = self.lock();
        script.polls_served += 1;
        match script.poll_steps.pop_front() {
            Some(PollStep::Deliver(partial)) => Ok(partial),
            Some(PollStep::Fault(message)) => Err(ClientError::rejected(500, message)),
            None => Ok(FxHashMap::default()),
        }
    }

    async fn fetch_experiment(&self, uid: &str) -> Result<StoredExperiment, ClientError> {
        self.lock()
            .experiments
            .get(uid)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                uid: uid.to_string(),
            })
    }
}

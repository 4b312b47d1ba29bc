//! The result poller: a cancellable scheduled task per active run.
//!
//! One task is spawned when a run reaches `success` (or an imported run
//! resumes) and lives until the run settles, faults, or is revoked. Every
//! outcome it produces is stamped with the run identifier it polled for;
//! the state machine discards stamps that no longer match, so a revoked
//! poller's in-flight cycle cannot corrupt a newer run. Revocation is
//! therefore a latency optimization, not a correctness requirement.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::{task, time};
use tracing::debug;

use crate::client::ExecutionClient;
use crate::config::PollPolicy;
use crate::types::{NodeId, RunId};

use super::machine::RunEvent;

/// What the orchestrator tells the poll task after applying an outcome.
pub(crate) enum PollVerdict {
    /// Keep polling with this pending set. `made_progress` resets the
    /// backoff so a run that is actively resolving is polled briskly.
    Continue {
        pending: Vec<NodeId>,
        made_progress: bool,
    },
    /// The run left `success` (settled, faulted, canceled, replaced).
    Stop,
}

/// Owning handle to a live poll task. Dropping it (or calling
/// [`revoke`](Self::revoke)) signals shutdown and aborts the task.
#[derive(Debug)]
pub(crate) struct PollHandle {
    run_id: RunId,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: task::JoinHandle<()>,
}

impl PollHandle {
    pub(crate) fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Stop the task promptly. Any cycle already in flight resolves to a
    /// stamped event the state machine will discard.
    pub(crate) fn revoke(self) {
        drop(self);
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }
}

/// Spawn the poll loop for `run_id`.
///
/// `apply` hands each stamped outcome to the state machine (under the
/// orchestrator's lock) and reports whether to re-arm. The loop sleeps
/// per `policy` before every cycle, so cancellation during the sleep
/// costs nothing.
pub(crate) fn spawn_poller<F>(
    client: Arc<dyn ExecutionClient>,
    run_id: RunId,
    policy: PollPolicy,
    initial_pending: Vec<NodeId>,
    apply: F,
) -> PollHandle
where
    F: Fn(RunEvent) -> PollVerdict + Send + Sync + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let task_run_id = run_id.clone();

    let handle = task::spawn(async move {
        let mut pending = initial_pending;
        let mut attempt: u32 = 0;
        loop {
            let delay = policy.delay_for(attempt);
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!(run_id = %task_run_id, "poller revoked");
                    break;
                }
                _ = time::sleep(delay) => {}
            }

            let event = match client.poll(&task_run_id, &pending).await {
                Ok(partial) => RunEvent::PollDelivered {
                    run_id: task_run_id.clone(),
                    partial,
                },
                Err(err) => RunEvent::PollFaulted {
                    run_id: task_run_id.clone(),
                    message: err.to_string(),
                },
            };

            match apply(event) {
                PollVerdict::Continue {
                    pending: next,
                    made_progress,
                } => {
                    pending = next;
                    attempt = if made_progress {
                        0
                    } else {
                        attempt.saturating_add(1)
                    };
                }
                PollVerdict::Stop => {
                    debug!(run_id = %task_run_id, "poller stopping");
                    break;
                }
            }
        }
    });

    PollHandle {
        run_id,
        shutdown_tx: Some(shutdown_tx),
        handle,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use rustc_hash::FxHashMap;

    use crate::client::{ClientError, InMemoryExecutionService, PollStep};
    use crate::experiment::StoredExperiment;
    use crate::run::{NodeResult, RunRequest};

    use super::*;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = time::Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(time::Instant::now() < deadline, "condition not met in time");
            time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn brisk() -> PollPolicy {
        PollPolicy::fixed(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn continue_verdict_rearms_until_stop() {
        let service = Arc::new(InMemoryExecutionService::new());
        let applied = Arc::new(AtomicUsize::new(0));

        let applied_in_loop = applied.clone();
        let handle = spawn_poller(
            service.clone(),
            RunId::new("run-a"),
            brisk(),
            vec!["n1".to_string()],
            move |_event| {
                let seen = applied_in_loop.fetch_add(1, Ordering::SeqCst) + 1;
                if seen < 3 {
                    PollVerdict::Continue {
                        pending: vec!["n1".to_string()],
                        made_progress: false,
                    }
                } else {
                    PollVerdict::Stop
                }
            },
        );

        wait_until(|| applied.load(Ordering::SeqCst) == 3).await;
        // Stopped on its own: no further cycles run.
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(applied.load(Ordering::SeqCst), 3);
        assert_eq!(service.polls_served(), 3);
        drop(handle);
    }

    #[tokio::test]
    async fn stop_verdict_ends_the_loop_after_one_cycle() {
        let service = Arc::new(InMemoryExecutionService::new());
        let applied = Arc::new(AtomicUsize::new(0));

        let applied_in_loop = applied.clone();
        let _handle = spawn_poller(
            service.clone(),
            RunId::new("run-b"),
            brisk(),
            vec![],
            move |_event| {
                applied_in_loop.fetch_add(1, Ordering::SeqCst);
                PollVerdict::Stop
            },
        );

        wait_until(|| applied.load(Ordering::SeqCst) == 1).await;
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(service.polls_served(), 1);
    }

    #[tokio::test]
    async fn revoke_halts_future_cycles() {
        let service = Arc::new(InMemoryExecutionService::new());
        let applied = Arc::new(AtomicUsize::new(0));

        let applied_in_loop = applied.clone();
        let handle = spawn_poller(
            service.clone(),
            RunId::new("run-c"),
            brisk(),
            vec![],
            move |_event| {
                applied_in_loop.fetch_add(1, Ordering::SeqCst);
                PollVerdict::Continue {
                    pending: vec![],
                    made_progress: false,
                }
            },
        );

        wait_until(|| applied.load(Ordering::SeqCst) >= 1).await;
        handle.revoke();

        let after_revoke = service.polls_served();
        time::sleep(Duration::from_millis(200)).await;
        // At most the cycle already in flight completes.
        assert!(service.polls_served() <= after_revoke + 1);
    }

    #[tokio::test]
    async fn service_fault_becomes_a_stamped_fault_event() {
        let service = Arc::new(InMemoryExecutionService::new());
        service.enqueue(PollStep::Fault("backend down".into()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_in_loop = seen.clone();
        let _handle = spawn_poller(
            service,
            RunId::new("run-d"),
            brisk(),
            vec!["n1".to_string()],
            move |event| {
                let summary = match event {
                    RunEvent::PollFaulted { run_id, message } => {
                        format!("fault {run_id}: {message}")
                    }
                    other => format!("unexpected {}", other.label()),
                };
                seen_in_loop.lock().unwrap().push(summary);
                PollVerdict::Stop
            },
        );

        wait_until(|| !seen.lock().unwrap().is_empty()).await;
        let summary = seen.lock().unwrap().remove(0);
        assert!(summary.starts_with("fault run-d:"), "{summary}");
        assert!(summary.contains("backend down"), "{summary}");
    }

    /// The pending set returned by a `Continue` verdict is what the next
    /// cycle asks the service about.
    #[tokio::test]
    async fn continue_verdict_threads_the_pending_set() {
        #[derive(Default)]
        struct RecordingClient {
            asked: Mutex<Vec<Vec<NodeId>>>,
        }

        #[async_trait]
        impl ExecutionClient for RecordingClient {
            async fn launch(&self, _request: &RunRequest) -> Result<RunId, ClientError> {
                Ok(RunId::new("unused"))
            }

            async fn relaunch(
                &self,
                run_id: &RunId,
                _request: &RunRequest,
            ) -> Result<RunId, ClientError> {
                Ok(run_id.clone())
            }

            async fn poll(
                &self,
                _run_id: &RunId,
                pending: &[NodeId],
            ) -> Result<FxHashMap<NodeId, NodeResult>, ClientError> {
                self.asked.lock().unwrap().push(pending.to_vec());
                Ok(FxHashMap::default())
            }

            async fn fetch_experiment(&self, uid: &str) -> Result<StoredExperiment, ClientError> {
                Err(ClientError::NotFound {
                    uid: uid.to_string(),
                })
            }
        }

        let client = Arc::new(RecordingClient::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_in_loop = calls.clone();
        let _handle = spawn_poller(
            client.clone(),
            RunId::new("run-e"),
            brisk(),
            vec!["alpha".to_string(), "beta".to_string()],
            move |_event| {
                if calls_in_loop.fetch_add(1, Ordering::SeqCst) == 0 {
                    PollVerdict::Continue {
                        pending: vec!["beta".to_string()],
                        made_progress: true,
                    }
                } else {
                    PollVerdict::Stop
                }
            },
        );

        wait_until(|| calls.load(Ordering::SeqCst) == 2).await;
        let asked = client.asked.lock().unwrap().clone();
        assert_eq!(asked[0], vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(asked[1], vec!["beta".to_string()]);
    }
}

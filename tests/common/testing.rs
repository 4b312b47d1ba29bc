#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use skein::client::ExecutionClient;
use skein::config::{OrchestratorConfig, PollPolicy};
use skein::run::{RunOrchestrator, RunStatus};

/// Fast poll cadence for tests. The policy floor still applies, so one
/// cycle is roughly 50ms.
pub fn brisk_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_poll_policy(PollPolicy::fixed(Duration::from_millis(10)))
        .with_memory_event_bus()
}

pub fn orchestrator_with(client: Arc<dyn ExecutionClient>) -> RunOrchestrator {
    RunOrchestrator::with_config(client, brisk_config())
}

/// Poll the orchestrator until it reports `status`.
pub async fn wait_for_status(orchestrator: &RunOrchestrator, status: RunStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = orchestrator.status();
        if current == status {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "orchestrator stuck in {current} waiting for {status}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Spin on `condition`, panicking with `what` after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out: {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Let the bus listener drain before reading a memory sink.
pub async fn settle_events() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

#![allow(dead_code)]

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::Notify;

use skein::client::{ClientError, ExecutionClient};
use skein::experiment::StoredExperiment;
use skein::run::{NodeResult, RunRequest};
use skein::types::{NodeId, RunId};

/// Client whose submissions park inside `launch`/`relaunch` until the test
/// releases them, so cancel and guard interleavings can be pinned down
/// instead of raced.
pub struct GatedClient {
    entered: (flume::Sender<()>, flume::Receiver<()>),
    release: Notify,
}

impl GatedClient {
    pub fn new() -> Self {
        Self {
            entered: flume::unbounded(),
            release: Notify::new(),
        }
    }

    /// Wait until a submission is parked inside the client.
    pub async fn entered_launch(&self) {
        self.entered
            .1
            .recv_async()
            .await
            .expect("gated client dropped");
    }

    /// Let one parked submission proceed.
    pub fn release_launch(&self) {
        self.release.notify_one();
    }

    async fn park(&self) {
        self.entered.0.send(()).expect("entered receiver dropped");
        self.release.notified().await;
    }
}

impl Default for GatedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionClient for GatedClient {
    async fn launch(&self, _request: &RunRequest) -> Result<RunId, ClientError> {
        self.park().await;
        Ok(RunId::new("gated001"))
    }

    async fn relaunch(&self, run_id: &RunId, _request: &RunRequest) -> Result<RunId, ClientError> {
        self.park().await;
        Ok(run_id.clone())
    }

    async fn poll(
        &self,
        _run_id: &RunId,
        _pending: &[NodeId],
    ) -> Result<FxHashMap<NodeId, NodeResult>, ClientError> {
        Ok(FxHashMap::default())
    }

    async fn fetch_experiment(&self, uid: &str) -> Result<StoredExperiment, ClientError> {
        Err(ClientError::NotFound {
            uid: uid.to_string(),
        })
    }
}

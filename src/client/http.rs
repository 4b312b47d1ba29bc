//! reqwest implementation of [`ExecutionClient`] against the service's REST
//! surface.
//!
//! Endpoints, matching the service routers:
//!
//! - `POST {base}/run/{project}` — launch, returns the run id as a JSON
//!   string
//! - `POST {base}/run/{project}/{uid}` — relaunch under an existing id
//! - `POST {base}/run/result/{project}/{uid}` — poll; body carries
//!   `pendingNodeIdList`, response maps node id to outcome
//! - `GET {base}/experiments/{project}/{uid}` — stored experiment record

use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::experiment::StoredExperiment;
use crate::run::{NodeResult, RunRequest};
use crate::types::{NodeId, RunId};

use super::{ClientError, ExecutionClient};

/// Connection settings for [`HttpExecutionClient`].
///
/// Resolution order is explicit values, then environment (via `dotenvy`,
/// so a local `.env` works), then defaults:
///
/// - `SKEIN_SERVICE_URL` (default `http://localhost:8000`)
/// - `SKEIN_PROJECT_ID` (default `default`)
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub project: String,
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            project: "default".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpClientConfig {
    /// Resolve settings from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            base_url: std::env::var("SKEIN_SERVICE_URL").unwrap_or(defaults.base_url),
            project: std::env::var("SKEIN_PROJECT_ID").unwrap_or(defaults.project),
            timeout: defaults.timeout,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct PollBody<'a> {
    #[serde(rename = "pendingNodeIdList")]
    pending: &'a [NodeId],
}

/// HTTP client for the execution service.
///
/// # Examples
///
/// ```rust,no_run
/// use skein::client::{HttpClientConfig, HttpExecutionClient};
///
/// let client = HttpExecutionClient::new(
///     HttpClientConfig::from_env().with_project("lab7"),
/// ).unwrap();
/// # let _ = client;
/// ```
#[derive(Debug)]
pub struct HttpExecutionClient {
    http: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpExecutionClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| ClientError::Transport { source })?;
        Ok(Self { http, config })
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/{suffix}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Check the status, then decode the body strictly. Decoding from the
    /// raw text (instead of `Response::json`) keeps serde's error as the
    /// source, which is what [`ClientError::Malformed`] reports.
    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Transport { source })?;
        if !status.is_success() {
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|source| ClientError::Malformed { source })
    }
}

#[async_trait]
impl ExecutionClient for HttpExecutionClient {
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn launch(&self, request: &RunRequest) -> Result<RunId, ClientError> {
        let url = self.url(&format!("run/{}", self.config.project));
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::Transport { source })?;
        let id: String = Self::decode(response).await?;
        Ok(RunId::new(id))
    }

    #[instrument(skip(self, request), fields(run_id = %run_id), err)]
    async fn relaunch(&self, run_id: &RunId, request: &RunRequest) -> Result<RunId, ClientError> {
        let url = self.url(&format!("run/{}/{}", self.config.project, run_id));
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::Transport { source })?;
        let id: String = Self::decode(response).await?;
        Ok(RunId::new(id))
    }

    #[instrument(skip(self, pending), fields(run_id = %run_id, pending = pending.len()), err)]
    async fn poll(
        &self,
        run_id: &RunId,
        pending: &[NodeId],
    ) -> Result<FxHashMap<NodeId, NodeResult>, ClientError> {
        let url = self.url(&format!("run/result/{}/{}", self.config.project, run_id));
        let response = self
            .http
            .post(url)
            .json(&PollBody { pending })
            .send()
            .await
            .map_err(|source| ClientError::Transport { source })?;
        Self::decode(response).await
    }

    #[instrument(skip(self), err)]
    async fn fetch_experiment(&self, uid: &str) -> Result<StoredExperiment, ClientError> {
        let url = self.url(&format!("experiments/{}/{uid}", self.config.project));
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Transport { source })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                uid: uid.to_string(),
            });
        }
        Self::decode(response).await
    }
}

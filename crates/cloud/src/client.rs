//! HTTP client for the remote queue service.
//!
//! Three ways in: `submit` + `await_completion` for the asynchronous
//! queue path, and `run_sync` for the synchronous path with its
//! gateway-error retry envelope.  Credentials and endpoint identity are
//! injected once through [`RemoteConfig`]; nothing here is global.
//!
//! The status polling loop deliberately has no attempt cap: remote jobs
//! may queue behind other tenants' work far longer than a local graph
//! execution is allowed to run.  Callers bound their exposure with the
//! cancellation token or by sequencing batches.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use faceforge_core::backoff::BackoffPolicy;
use faceforge_core::error::CoreError;
use faceforge_core::job::{JobRecord, JobStatus, OutputPayload};
use faceforge_core::request::{random_seed, GenerationRequest, WorkflowSource};

use crate::payload::{
    JobInput, JobSubmission, OutputResponse, RunResponse, RunSyncResponse, StatusResponse,
};

/// Default base URL of the queue service API.
pub const DEFAULT_API_BASE: &str = "https://api.runpod.ai";
/// Default delay between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Connection parameters for one remote endpoint.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API base URL, e.g. `https://api.runpod.ai`.
    pub api_base: String,
    /// Endpoint identifier under `/v2/`.
    pub endpoint_id: String,
    /// Bearer token.
    pub api_key: String,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Retry envelope for the synchronous run path.
    pub backoff: BackoffPolicy,
}

impl RemoteConfig {
    /// Config for an endpoint on the default API base with default
    /// polling and backoff.
    pub fn new(endpoint_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            endpoint_id: endpoint_id.into(),
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Errors from the remote job client.
#[derive(Debug, thiserror::Error)]
pub enum RemoteJobError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// The submission response carried no job identifier.
    #[error("Remote service response did not contain a job id")]
    MissingJobId,

    /// The job reached the FAILED terminal status.
    #[error("Remote job failed: {0}")]
    Failed(String),

    /// The job reached the CANCELLED terminal status.
    #[error("Remote job was cancelled")]
    JobCancelled,

    /// A network-level failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service returned a non-2xx status outside the retried
    /// synchronous path.
    #[error("Remote API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A received body could not be decoded.
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A workflow file could not be read while building the payload.
    #[error("Failed to read workflow file: {0}")]
    WorkflowIo(#[from] std::io::Error),

    /// The synchronous retry envelope was exhausted.
    #[error("Retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The cancellation token fired during a wait.
    #[error("Wait interrupted by cancellation")]
    Interrupted,
}

/// Client for one remote queue endpoint.
pub struct RemoteJobClient {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteJobClient {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Submit a request to the queue.
    ///
    /// Fails fast with [`RemoteJobError::MissingJobId`] when the service
    /// does not acknowledge the job, before any polling happens.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<JobRecord, RemoteJobError> {
        request.validate()?;

        let seed = request.seed.unwrap_or_else(random_seed);
        let input = self.build_input(request, seed).await?;

        tracing::info!(seed, endpoint_id = %self.config.endpoint_id, "Submitting remote job");

        let response: RunResponse = self
            .request_json(self.client.post(self.op_url("run")).json(&JobSubmission { input }))
            .await?;

        let id = response.id.ok_or(RemoteJobError::MissingJobId)?;
        tracing::info!(job_id = %id, "Remote job submitted");

        Ok(JobRecord::new(id))
    }

    /// Poll one job status.
    pub async fn status(&self, job_id: &str) -> Result<StatusResponse, RemoteJobError> {
        self.request_json(self.client.get(self.job_url("status", job_id)))
            .await
    }

    /// Fetch the output payload of a completed job.
    ///
    /// A response without an output section (or without images) yields
    /// an empty payload, not an error.
    pub async fn fetch_output(&self, job_id: &str) -> Result<OutputPayload, RemoteJobError> {
        let response: OutputResponse = self
            .request_json(self.client.get(self.job_url("output", job_id)))
            .await?;

        Ok(response.output.unwrap_or_default())
    }

    /// Poll the job to a terminal status and return its output.
    ///
    /// Continues while the status is QUEUED or IN_PROGRESS, sleeping
    /// [`RemoteConfig::poll_interval`] between checks.  No attempt cap;
    /// see the module docs.
    pub async fn await_completion(
        &self,
        job: &mut JobRecord,
        cancel: &CancellationToken,
    ) -> Result<OutputPayload, RemoteJobError> {
        loop {
            let response = self.status(&job.id).await?;
            job.apply_poll(response.status, response.error.clone());

            match response.status {
                JobStatus::Completed => {
                    tracing::info!(job_id = %job.id, "Remote job completed");
                    return self.fetch_output(&job.id).await;
                }
                JobStatus::Failed => {
                    let error = response
                        .error
                        .unwrap_or_else(|| "Unknown error".to_string());
                    tracing::warn!(job_id = %job.id, error = %error, "Remote job failed");
                    return Err(RemoteJobError::Failed(error));
                }
                JobStatus::Cancelled => {
                    tracing::warn!(job_id = %job.id, "Remote job cancelled");
                    return Err(RemoteJobError::JobCancelled);
                }
                JobStatus::Queued | JobStatus::InProgress => {
                    tracing::debug!(job_id = %job.id, status = ?response.status, "Remote job pending");
                    self.wait(self.config.poll_interval, cancel).await?;
                }
            }
        }
    }

    /// Run a request through the synchronous endpoint.
    ///
    /// Gateway errors (502) and request-level transport failures retry
    /// under the exponential-backoff envelope; an undecodable body is
    /// logged and the loop moves straight to the next attempt.  The
    /// envelope exhausting is a terminal failure distinct from any
    /// single attempt's error.
    pub async fn run_sync(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<OutputPayload, RemoteJobError> {
        request.validate()?;

        let seed = request.seed.unwrap_or_else(random_seed);
        let input = self.build_input(request, seed).await?;
        let submission = JobSubmission { input };
        let url = self.op_url("runsync");
        let max = self.config.backoff.max_retries;

        for attempt in 0..max {
            let response = match self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&submission)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Synchronous run request failed");
                    if attempt + 1 < max {
                        self.backoff_wait(attempt, cancel).await?;
                    }
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::BAD_GATEWAY {
                tracing::warn!(attempt, "Remote gateway unavailable (502)");
                self.backoff_wait(attempt, cancel).await?;
                continue;
            }
            if !status.is_success() {
                tracing::warn!(attempt, status = status.as_u16(), "Synchronous run returned an error status");
                if attempt + 1 < max {
                    self.backoff_wait(attempt, cancel).await?;
                }
                continue;
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to read synchronous run body");
                    if attempt + 1 < max {
                        self.backoff_wait(attempt, cancel).await?;
                    }
                    continue;
                }
            };

            match serde_json::from_str::<RunSyncResponse>(&body) {
                Ok(parsed) => {
                    if let Some(error) = parsed.error {
                        return Err(RemoteJobError::Failed(error));
                    }
                    if let Some(output) = parsed.output {
                        return Ok(output);
                    }
                    tracing::warn!(attempt, "Synchronous run response contained no output");
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to decode synchronous run response");
                }
            }
        }

        Err(RemoteJobError::RetriesExhausted { attempts: max })
    }

    /// Liveness probe for the endpoint, passed through verbatim for
    /// external monitoring.
    pub async fn health(&self) -> Result<serde_json::Value, RemoteJobError> {
        self.request_json(self.client.get(self.op_url("health")))
            .await
    }

    // ---- private helpers ----

    async fn build_input(
        &self,
        request: &GenerationRequest,
        seed: u32,
    ) -> Result<JobInput, RemoteJobError> {
        let workflow = match &request.workflow {
            None => None,
            Some(source) => Some(workflow_value(source).await?),
        };

        Ok(JobInput {
            prompt: request.prompt.clone(),
            face_id_weight: request.face_id_weight,
            seed,
            reference_image: request.reference_image.as_payload(),
            workflow,
        })
    }

    /// Send a request with bearer auth and decode the JSON body,
    /// surfacing non-2xx statuses with their raw body.
    async fn request_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, RemoteJobError> {
        let response = builder.bearer_auth(&self.config.api_key).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RemoteJobError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn backoff_wait(
        &self,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteJobError> {
        let Some(delay) = self.config.backoff.delay(attempt) else {
            return Ok(());
        };
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
        self.wait(delay, cancel).await
    }

    /// Sleep, unless the cancellation token fires first.
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), RemoteJobError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(RemoteJobError::Interrupted),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn op_url(&self, op: &str) -> String {
        format!(
            "{}/v2/{}/{op}",
            self.config.api_base, self.config.endpoint_id
        )
    }

    fn job_url(&self, op: &str, job_id: &str) -> String {
        format!(
            "{}/v2/{}/{op}/{job_id}",
            self.config.api_base, self.config.endpoint_id
        )
    }
}

/// Convert a workflow source into the submission payload value.
///
/// URLs pass through as strings -- the remote handler downloads them on
/// its side.  Files are read here because the remote service cannot see
/// this machine's disk.
async fn workflow_value(source: &WorkflowSource) -> Result<serde_json::Value, RemoteJobError> {
    match source {
        WorkflowSource::Inline(value) => Ok(value.clone()),
        WorkflowSource::Json(text) => Ok(serde_json::from_str(text)?),
        WorkflowSource::Url(url) => Ok(serde_json::Value::String(url.clone())),
        WorkflowSource::Path(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}

//! Bounded submit-and-poll driver for the local engine.
//!
//! The driver owns the full local execution protocol: readiness probing
//! (the only place a missing engine is fatal rather than retried
//! forever), one-shot submission (never retried -- the caller must
//! resubmit), completion polling against a hard wall-clock ceiling the
//! engine cannot extend, and artifact extraction from the execution
//! history.  Every wait is raced against a [`CancellationToken`] so a
//! shutdown signal can interrupt it.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use faceforge_core::artifact::{encode_bytes, Artifact};
use faceforge_core::request::{ImageSource, WorkflowSource};

use crate::api::{EngineApi, EngineApiError, HistoryEntry};
use crate::inputs::{stage_reference_image, StagedReference, StagingError};
use crate::workflow::{resolve_source, WorkflowError, WorkflowGraph};

/// Default engine HTTP endpoint.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8188";
/// Default directory the engine loads input images from.
pub const DEFAULT_INPUT_DIR: &str = "/ComfyUI/input";
/// Default directory the engine writes output images to.
pub const DEFAULT_OUTPUT_DIR: &str = "/ComfyUI/output";
/// Default face-identity workflow used when a request carries none.
pub const DEFAULT_WORKFLOW: &str = "/ComfyUI/workflows/FLUXLORAPULID.json";

/// Tunable parameters for the local execution protocol.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base HTTP URL of the engine.
    pub base_url: String,
    /// Directory reference images are staged into.
    pub input_dir: PathBuf,
    /// Directory output images are read back from.
    pub output_dir: PathBuf,
    /// Workflow file used when the request does not carry one.
    pub default_workflow: Option<PathBuf>,
    /// Readiness probe attempts before giving up.
    pub max_readiness_attempts: u32,
    /// Delay between readiness probes.
    pub readiness_interval: Duration,
    /// Delay between history polls.
    pub poll_interval: Duration,
    /// History polls before the execution is declared timed out.
    pub max_poll_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            default_workflow: Some(PathBuf::from(DEFAULT_WORKFLOW)),
            max_readiness_attempts: 5,
            readiness_interval: Duration::from_secs(30),
            poll_interval: Duration::from_secs(3),
            max_poll_attempts: 90,
        }
    }
}

/// Errors from the local execution driver.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The readiness probe was exhausted without a successful response.
    #[error("Engine did not become ready after {attempts} attempts")]
    Unavailable { attempts: u32 },

    /// The engine refused the submitted graph.
    #[error("Engine rejected workflow ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The polling ceiling was exceeded before completion.
    #[error("Timed out waiting for execution to complete after {attempts} polls")]
    Timeout { attempts: u32 },

    /// A network-level failure outside the retried readiness phase.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// An output image listed in the history could not be read back.
    #[error("Failed to read output image {filename}: {source}")]
    OutputRead {
        filename: String,
        source: std::io::Error,
    },

    /// The cancellation token fired during a wait.
    #[error("Execution wait interrupted by cancellation")]
    Interrupted,
}

/// Drives one workflow at a time through a local engine instance.
pub struct EngineDriver {
    api: EngineApi,
    http: reqwest::Client,
    config: EngineConfig,
}

impl EngineDriver {
    pub fn new(config: EngineConfig) -> Self {
        let http = reqwest::Client::new();
        let api = EngineApi::with_client(http.clone(), config.base_url.clone());
        Self { api, http, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve a workflow source into a graph using the driver's HTTP
    /// client.
    pub async fn resolve_workflow(
        &self,
        source: &WorkflowSource,
    ) -> Result<WorkflowGraph, EngineError> {
        Ok(resolve_source(source, &self.http).await?)
    }

    /// Stage a reference image into the engine's input directory.
    pub async fn stage_reference(
        &self,
        source: &ImageSource,
    ) -> Result<StagedReference, EngineError> {
        Ok(stage_reference_image(&self.http, source, &self.config.input_dir).await?)
    }

    /// Execute a patched graph to completion and return its artifacts.
    ///
    /// Submission failures are not retried; only the readiness probe
    /// retries, and only up to its attempt cap.
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        cancel: &CancellationToken,
    ) -> Result<Vec<Artifact>, EngineError> {
        self.wait_until_ready(cancel).await?;

        let submitted = match self.api.submit_workflow(graph).await {
            Ok(response) => response,
            Err(EngineApiError::ApiError { status, body }) => {
                return Err(EngineError::Rejected { status, body })
            }
            Err(EngineApiError::Request(e)) => return Err(EngineError::Transport(e)),
        };

        tracing::info!(prompt_id = %submitted.prompt_id, "Workflow submitted to engine");

        let entry = self.poll_history(&submitted.prompt_id, cancel).await?;
        self.collect_artifacts(&entry).await
    }

    // ---- protocol phases ----

    /// Probe the status endpoint until the engine answers or the
    /// attempt cap is reached.
    async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<(), EngineError> {
        let max = self.config.max_readiness_attempts;

        for attempt in 1..=max {
            match self.api.system_stats().await {
                Ok(()) => {
                    tracing::debug!(attempt, "Engine ready");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, max, error = %e, "Engine not ready");
                }
            }
            if attempt < max {
                self.wait(self.config.readiness_interval, cancel).await?;
            }
        }

        Err(EngineError::Unavailable { attempts: max })
    }

    /// Poll the execution history until the entry reports completion.
    ///
    /// Poll failures are logged and count against the attempt cap; the
    /// ceiling is wall-clock, enforced here regardless of what the
    /// engine believes.
    async fn poll_history(
        &self,
        prompt_id: &str,
        cancel: &CancellationToken,
    ) -> Result<HistoryEntry, EngineError> {
        let max = self.config.max_poll_attempts;

        for attempt in 1..=max {
            self.wait(self.config.poll_interval, cancel).await?;

            match self.api.history(prompt_id).await {
                Ok(history) => {
                    if let Some(entry) = history.get(prompt_id) {
                        if entry.status.completed {
                            tracing::info!(prompt_id, attempt, "Engine execution complete");
                            return Ok(entry.clone());
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(prompt_id, attempt, error = %e, "History poll failed");
                }
            }
        }

        Err(EngineError::Timeout { attempts: max })
    }

    /// Read every image the history lists out of the output directory,
    /// in the order the engine returned nodes and images.
    async fn collect_artifacts(&self, entry: &HistoryEntry) -> Result<Vec<Artifact>, EngineError> {
        let mut artifacts = Vec::new();

        for (node_id, output) in &entry.outputs {
            let Some(images) = &output.images else {
                continue;
            };
            for image in images {
                let path = self.config.output_dir.join(&image.filename);
                let bytes =
                    tokio::fs::read(&path)
                        .await
                        .map_err(|source| EngineError::OutputRead {
                            filename: image.filename.clone(),
                            source,
                        })?;
                tracing::debug!(node_id = %node_id, filename = %image.filename, "Collected output image");
                artifacts.push(Artifact {
                    filename: image.filename.clone(),
                    data: encode_bytes(&bytes),
                    source_path: Some(path),
                });
            }
        }

        Ok(artifacts)
    }

    /// Sleep, unless the cancellation token fires first.
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), EngineError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Interrupted),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

//! REST API client for the engine's HTTP endpoints.
//!
//! Wraps the three endpoints the driver needs -- the readiness probe,
//! workflow submission, and history retrieval -- using [`reqwest`].

use indexmap::IndexMap;
use serde::Deserialize;

use crate::workflow::WorkflowGraph;

/// HTTP client for a single engine instance.
pub struct EngineApi {
    client: reqwest::Client,
    base_url: String,
}

/// Response returned by the engine's `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
}

/// One image listed in a node's outputs.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    pub filename: String,
}

/// Outputs of a single node in the execution history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    /// Present only for image-producing nodes.
    #[serde(default)]
    pub images: Option<Vec<ImageRef>>,
}

/// Completion state of a history entry.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub completed: bool,
}

/// History entry for one executed prompt.
///
/// `outputs` preserves the engine's node order -- stable but
/// engine-defined, not sorted.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub status: HistoryStatus,
    #[serde(default)]
    pub outputs: IndexMap<String, NodeOutput>,
}

/// Response of `GET /history/{prompt_id}`: a mapping keyed by prompt id.
pub type HistoryResponse = IndexMap<String, HistoryEntry>;

/// Errors from the engine REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("Engine API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl EngineApi {
    /// Create a new API client for an engine instance.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling with the staging layer).
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Probe the engine's status endpoint.
    ///
    /// Sends a `GET /system_stats` request.  Success means the engine is
    /// up and ready to accept work.
    pub async fn system_stats(&self) -> Result<(), EngineApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.base_url))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given graph.  Returns the
    /// server-assigned `prompt_id`.
    pub async fn submit_workflow(
        &self,
        workflow: &WorkflowGraph,
    ) -> Result<SubmitResponse, EngineApiError> {
        let body = serde_json::json!({ "prompt": workflow });

        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request.  The entry for the
    /// prompt carries its completion flag and per-node outputs.
    pub async fn history(&self, prompt_id: &str) -> Result<HistoryResponse, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`EngineApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), EngineApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

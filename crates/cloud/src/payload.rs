//! Wire types for the remote queue service.

use serde::{Deserialize, Serialize};

use faceforge_core::job::{JobStatus, OutputPayload};

/// Request parameters inside the submission envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JobInput {
    pub prompt: String,
    pub face_id_weight: f64,
    pub seed: u32,
    /// Reference image in string form; the remote handler resolves
    /// URLs, data URIs and bare base64 on its side.
    pub reference_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<serde_json::Value>,
}

/// Body of `POST /v2/{endpoint}/run` and `/runsync`.
#[derive(Debug, Serialize)]
pub struct JobSubmission {
    pub input: JobInput,
}

/// Response of `POST /v2/{endpoint}/run`.
#[derive(Debug, Deserialize)]
pub struct RunResponse {
    /// Absent when submission was not accepted.
    #[serde(default)]
    pub id: Option<String>,
}

/// Response of `GET /v2/{endpoint}/status/{id}`.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of `GET /v2/{endpoint}/output/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct OutputResponse {
    #[serde(default)]
    pub output: Option<OutputPayload>,
}

/// Response of `POST /v2/{endpoint}/runsync`: either an output payload
/// or a handler-reported error.
#[derive(Debug, Default, Deserialize)]
pub struct RunSyncResponse {
    #[serde(default)]
    pub output: Option<OutputPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

//! Generation request model and validation.
//!
//! A [`GenerationRequest`] is constructed once per invocation and is
//! immutable after [`validate`](GenerationRequest::validate) passes; both
//! execution backends take it by shared reference.  Validation failures
//! surface before any network call is made.

use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::artifact::{encode_bytes, DATA_URI_PREFIX};
use crate::error::CoreError;

/// Default face-identity conditioning weight.
pub const DEFAULT_FACE_ID_WEIGHT: f64 = 0.8;

/// Draw a seed uniformly over the full unsigned-32-bit range.
pub fn random_seed() -> u32 {
    rand::rng().random::<u32>()
}

/// The reference image accompanying a request, in one of the accepted
/// input forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImageSource {
    /// Remote URL, fetched by whoever stages the image.
    Url(String),
    /// Full data URI (`data:image/...;base64,...`).
    DataUri(String),
    /// Bare base64-encoded bytes.
    Base64(String),
    /// Raw bytes already in memory.
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Classify a string form by its prefix: `http(s)://` is a URL,
    /// `data:image` a data URI, anything else bare base64.
    pub fn parse(data: &str) -> Self {
        if data.starts_with("http://") || data.starts_with("https://") {
            Self::Url(data.to_string())
        } else if data.starts_with(DATA_URI_PREFIX) {
            Self::DataUri(data.to_string())
        } else {
            Self::Base64(data.to_string())
        }
    }

    /// The string form placed in a remote submission payload.
    ///
    /// String variants pass through verbatim -- the remote handler
    /// resolves URLs and data URIs on its side.  Raw bytes are encoded.
    pub fn as_payload(&self) -> String {
        match self {
            Self::Url(s) | Self::DataUri(s) | Self::Base64(s) => s.clone(),
            Self::Bytes(bytes) => encode_bytes(bytes),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Url(s) | Self::DataUri(s) | Self::Base64(s) => s.trim().is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
        }
    }
}

/// Where the node-graph workflow for a request comes from.
///
/// Resolution to a concrete graph happens in the engine layer; the
/// remote path forwards the source mostly as-is because the remote
/// handler accepts the same forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowSource {
    /// An already-loaded graph as raw JSON.
    Inline(serde_json::Value),
    /// A JSON document as text.
    Json(String),
    /// A URL to fetch the graph from.
    Url(String),
    /// A local file containing the graph.
    Path(PathBuf),
}

/// A face-consistent image-generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text prompt; must be non-empty after trimming.
    pub prompt: String,
    /// Face-identity conditioning weight in `[0, 1]`.
    pub face_id_weight: f64,
    /// Noise seed.  When absent a uniform random seed is drawn at the
    /// point of submission.
    pub seed: Option<u32>,
    /// Reference face image; mandatory.
    pub reference_image: ImageSource,
    /// Workflow override; when absent the engine's configured default
    /// workflow is used.
    pub workflow: Option<WorkflowSource>,
}

impl GenerationRequest {
    /// Build a request with default weight, no seed and no workflow
    /// override.
    pub fn new(prompt: impl Into<String>, reference_image: ImageSource) -> Self {
        Self {
            prompt: prompt.into(),
            face_id_weight: DEFAULT_FACE_ID_WEIGHT,
            seed: None,
            reference_image,
            workflow: None,
        }
    }

    /// Check the request invariants.
    ///
    /// - the prompt must be non-empty after trimming
    /// - the reference image must be present and non-empty
    /// - the face-identity weight must lie in `[0, 1]`
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation(
                "Prompt is required for image generation".to_string(),
            ));
        }
        if self.reference_image.is_empty() {
            return Err(CoreError::Validation(
                "Reference image is required for face consistency".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.face_id_weight) {
            return Err(CoreError::Validation(format!(
                "face_id_weight must be in [0, 1], got {}",
                self.face_id_weight
            )));
        }
        Ok(())
    }
}

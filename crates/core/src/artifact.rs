//! Transport codec for image payloads.
//!
//! Both execution backends move images around as base64 text: the local
//! engine's outputs are read from disk and encoded before they leave the
//! driver, and the remote queue service both accepts and returns images
//! in encoded form.  Decoding failures are always surfaced as
//! [`CoreError::Decode`], never swallowed.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Prefix carried by data-URI image payloads, e.g.
/// `data:image/png;base64,iVBOR...`.
pub const DATA_URI_PREFIX: &str = "data:image";

/// A single output image in transport encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Output filename as reported by the producing engine.
    pub filename: String,
    /// Base64-encoded image bytes.  Named `image` on the wire.
    #[serde(rename = "image")]
    pub data: String,
    /// Local path the bytes were read from, when the artifact came off
    /// the local engine's output directory.  Never present on the wire.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Artifact {
    /// Build an artifact from raw image bytes.
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            data: encode_bytes(bytes),
            source_path: None,
        }
    }

    /// Recover the original image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, CoreError> {
        decode_payload(&self.data)
    }
}

/// Encode raw bytes into the transport representation.
pub fn encode_bytes(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode a transport payload back into raw bytes.
///
/// Accepts either a bare base64 string or a full data URI, whose
/// `data:image/...;base64,` prefix is stripped before decoding.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, CoreError> {
    let encoded = if payload.starts_with(DATA_URI_PREFIX) {
        payload
            .split_once(',')
            .map(|(_, rest)| rest)
            .ok_or_else(|| CoreError::Decode("Data URI has no payload section".to_string()))?
    } else {
        payload
    };

    BASE64
        .decode(encoded.trim())
        .map_err(|e| CoreError::Decode(format!("Invalid base64 image data: {e}")))
}

/// Extract the basename from a path-like string, tolerating both Unix
/// and Windows separators.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

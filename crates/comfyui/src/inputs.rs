//! Reference-image staging into the engine's input directory.
//!
//! The engine loads images by filename from its own input directory, so
//! the reference face must land there before the graph is submitted.
//! Remote URLs are streamed to disk; encoded forms are decoded through
//! the core codec.  Staged files are namespaced by a per-run UUID so
//! concurrent callers cannot collide.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use faceforge_core::artifact::decode_payload;
use faceforge_core::error::CoreError;
use faceforge_core::request::ImageSource;

/// A reference image written into the engine's input directory.
#[derive(Debug, Clone)]
pub struct StagedReference {
    /// Bare filename, as load-image nodes expect it.
    pub filename: String,
    /// Full path of the staged file.
    pub path: PathBuf,
}

/// Errors staging a reference image.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to download reference image ({status})")]
    Download { status: u16 },

    #[error(transparent)]
    Decode(#[from] CoreError),

    #[error("Failed to write staged image: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve an [`ImageSource`] and write it into `input_dir`.
///
/// The staged filename is `{uuid}_reference.png`; the basename is what
/// gets patched into load-image nodes.
pub async fn stage_reference_image(
    client: &reqwest::Client,
    source: &ImageSource,
    input_dir: &Path,
) -> Result<StagedReference, StagingError> {
    let filename = format!("{}_reference.png", uuid::Uuid::new_v4());
    let path = input_dir.join(&filename);

    match source {
        ImageSource::Url(url) => {
            download_to_file(client, url, &path).await?;
        }
        ImageSource::DataUri(payload) | ImageSource::Base64(payload) => {
            let bytes = decode_payload(payload)?;
            tokio::fs::write(&path, bytes).await?;
        }
        ImageSource::Bytes(bytes) => {
            tokio::fs::write(&path, bytes).await?;
        }
    }

    tracing::debug!(filename = %filename, "Staged reference image");

    Ok(StagedReference { filename, path })
}

/// Stream an HTTP response body to a file chunk by chunk.
async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<(), StagingError> {
    let mut response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StagingError::Download {
            status: status.as_u16(),
        });
    }

    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

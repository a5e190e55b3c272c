//! The `generate` operation and its batch and saving companions.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use faceforge_cloud::client::{RemoteJobClient, RemoteJobError};
use faceforge_comfyui::driver::{EngineDriver, EngineError};
use faceforge_comfyui::workflow::{patch_workflow, PatchParams};
use faceforge_core::artifact::Artifact;
use faceforge_core::error::CoreError;
use faceforge_core::request::{random_seed, GenerationRequest, WorkflowSource};

use crate::config::{ConfigError, ExecutionTarget, GeneratorConfig};

/// Errors surfaced by the façade.  The façade never terminates the
/// process; process-level handling belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Remote(#[from] RemoteJobError),

    #[error("Failed to save artifact {filename}: {source}")]
    Save {
        filename: String,
        source: std::io::Error,
    },
}

/// Outcome of one batch item.
#[derive(Debug)]
pub struct BatchItem {
    /// Effective seed the item ran with.
    pub seed: Option<u32>,
    pub result: Result<Vec<Artifact>, GenerateError>,
}

enum Backend {
    Local(EngineDriver),
    Remote(RemoteJobClient),
}

/// Orchestrates a generation request through one configured backend.
///
/// One job is in flight per call; there is exactly one outstanding wait
/// at a time.  Once work is submitted it cannot be aborted -- the
/// cancellation token only stops observation.
pub struct Generator {
    backend: Backend,
    batch_delay: std::time::Duration,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self, ConfigError> {
        let backend = match config.target {
            ExecutionTarget::Local => Backend::Local(EngineDriver::new(config.engine)),
            ExecutionTarget::Remote => {
                let remote = config.remote.ok_or(ConfigError::MissingRemote)?;
                Backend::Remote(RemoteJobClient::new(remote))
            }
        };

        Ok(Self {
            backend,
            batch_delay: config.batch_delay,
        })
    }

    /// Generate one set of artifacts for the request.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Artifact>, GenerateError> {
        request.validate().map_err(GenerateError::Core)?;

        match &self.backend {
            Backend::Local(driver) => self.generate_local(driver, request, cancel).await,
            Backend::Remote(client) => {
                let mut job = client.submit(request).await?;
                let output = client.await_completion(&mut job, cancel).await?;
                tracing::info!(
                    job_id = %job.id,
                    count = output.images.len(),
                    "Remote generation complete",
                );
                Ok(output.images)
            }
        }
    }

    /// Generate `count` sets of artifacts strictly sequentially.
    ///
    /// Items without an explicit request seed each draw a fresh one.  A
    /// fixed delay separates consecutive items; a failed item is logged
    /// and recorded, not fatal to the rest.  Cancellation stops the
    /// batch at the item boundary.
    pub async fn generate_batch(
        &self,
        request: &GenerationRequest,
        count: u32,
        cancel: &CancellationToken,
    ) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(count as usize);

        for index in 0..count {
            if index > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::warn!(completed = items.len(), count, "Batch interrupted");
                        break;
                    }
                    _ = tokio::time::sleep(self.batch_delay) => {}
                }
            }

            let mut item_request = request.clone();
            if item_request.seed.is_none() {
                item_request.seed = Some(random_seed());
            }

            tracing::info!(item = index + 1, count, seed = ?item_request.seed, "Generating batch item");

            let result = self.generate(&item_request, cancel).await;
            if let Err(e) = &result {
                tracing::warn!(item = index + 1, error = %e, "Batch item failed");
            }

            items.push(BatchItem {
                seed: item_request.seed,
                result,
            });
        }

        items
    }

    // ---- local path ----

    async fn generate_local(
        &self,
        driver: &EngineDriver,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Artifact>, GenerateError> {
        let source = match &request.workflow {
            Some(source) => source.clone(),
            None => match &driver.config().default_workflow {
                Some(path) => WorkflowSource::Path(path.clone()),
                None => {
                    return Err(CoreError::Validation(
                        "No workflow provided and no default workflow configured".to_string(),
                    )
                    .into())
                }
            },
        };

        let mut graph = driver.resolve_workflow(&source).await?;
        let staged = driver.stage_reference(&request.reference_image).await?;
        let seed = request.seed.unwrap_or_else(random_seed);

        patch_workflow(
            &mut graph,
            &PatchParams {
                prompt: &request.prompt,
                face_id_weight: request.face_id_weight,
                seed: Some(seed),
                reference_image: Some(&staged.filename),
            },
        );

        tracing::info!(seed, "Executing workflow on local engine");

        let artifacts = driver.execute(&graph, cancel).await?;
        tracing::info!(count = artifacts.len(), "Local generation complete");
        Ok(artifacts)
    }
}

/// Write decoded artifacts into `dir` with seed and weight stamped into
/// each filename.
pub async fn save_artifacts(
    artifacts: &[Artifact],
    dir: &Path,
    seed: Option<u32>,
    face_id_weight: f64,
) -> Result<Vec<PathBuf>, GenerateError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| GenerateError::Save {
            filename: dir.display().to_string(),
            source,
        })?;

    let mut paths = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let bytes = artifact.decode()?;
        let path = dir.join(stamped_filename(&artifact.filename, seed, face_id_weight));

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| GenerateError::Save {
                filename: artifact.filename.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), "Saved artifact");
        paths.push(path);
    }

    Ok(paths)
}

/// Stamp the effective seed and weight into an output filename:
/// `out.png` becomes `out_seed-42_weight-0.8.png`.
pub fn stamped_filename(filename: &str, seed: Option<u32>, face_id_weight: f64) -> String {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (filename, "png"),
    };
    let seed = seed.map_or_else(|| "unknown".to_string(), |s| s.to_string());
    format!("{stem}_seed-{seed}_weight-{face_id_weight}.{ext}")
}

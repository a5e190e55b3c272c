//! `faceforge-worker` -- single-run generation entry point.
//!
//! Loads configuration from the environment, runs one generation (or a
//! sequential batch) through the orchestration façade, and saves the
//! resulting artifacts.  There is no CLI argument parsing; everything
//! arrives through environment variables, with `.env` support via
//! dotenvy.
//!
//! # Environment variables
//!
//! | Variable          | Required | Default    | Description                                  |
//! |-------------------|----------|------------|----------------------------------------------|
//! | `PROMPT`          | yes      | --         | Text prompt for the generation               |
//! | `REFERENCE_IMAGE` | yes      | --         | File path, URL, data URI, or base64 string   |
//! | `FACE_ID_WEIGHT`  | no       | `0.8`      | Face-identity conditioning weight in [0, 1]  |
//! | `SEED`            | no       | random     | Noise seed (32-bit unsigned)                 |
//! | `WORKFLOW`        | no       | configured | Path to a workflow graph JSON file           |
//! | `BATCH_COUNT`     | no       | `1`        | Number of sequential generations             |
//! | `OUTPUT_DIR`      | no       | `./output` | Directory saved artifacts are written to     |
//!
//! Backend selection and credentials are resolved by
//! [`GeneratorConfig::from_env`]; see that module's table.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faceforge_core::request::{GenerationRequest, ImageSource, WorkflowSource};
use faceforge_pipeline::config::GeneratorConfig;
use faceforge_pipeline::generator::{save_artifacts, Generator};

const DEFAULT_OUTPUT_DIR: &str = "./output";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "faceforge_worker=info,faceforge_pipeline=info,faceforge_comfyui=info,faceforge_cloud=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Ctrl-C abandons in-flight waits; already-submitted engine or
    // queue work keeps running server-side.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl-C, abandoning in-flight waits");
            signal_cancel.cancel();
        }
    });

    if let Err(e) = run(&cancel).await {
        tracing::error!(error = %e, "Generation failed");
        std::process::exit(1);
    }
}

async fn run(cancel: &CancellationToken) -> anyhow::Result<()> {
    let config = GeneratorConfig::from_env().context("Failed to resolve configuration")?;

    let prompt = std::env::var("PROMPT").context("PROMPT environment variable is required")?;
    let reference = std::env::var("REFERENCE_IMAGE")
        .context("REFERENCE_IMAGE environment variable is required")?;

    let mut request = GenerationRequest::new(prompt, resolve_reference(&reference).await?);

    if let Ok(weight) = std::env::var("FACE_ID_WEIGHT") {
        request.face_id_weight = weight
            .parse()
            .context("FACE_ID_WEIGHT must be a number in [0, 1]")?;
    }
    if let Ok(seed) = std::env::var("SEED") {
        request.seed = Some(
            seed.parse()
                .context("SEED must be a 32-bit unsigned integer")?,
        );
    }
    if let Ok(path) = std::env::var("WORKFLOW") {
        request.workflow = Some(WorkflowSource::Path(PathBuf::from(path)));
    }

    let batch_count: u32 = std::env::var("BATCH_COUNT")
        .ok()
        .map(|v| v.parse())
        .transpose()
        .context("BATCH_COUNT must be a positive integer")?
        .unwrap_or(1);

    let output_dir =
        PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.into()));

    let face_id_weight = request.face_id_weight;
    let generator = Generator::new(config)?;

    if batch_count > 1 {
        let items = generator.generate_batch(&request, batch_count, cancel).await;

        let mut failed = 0u32;
        for item in &items {
            match &item.result {
                Ok(artifacts) => {
                    save_artifacts(artifacts, &output_dir, item.seed, face_id_weight).await?;
                }
                Err(_) => failed += 1,
            }
        }

        tracing::info!(
            completed = items.len() as u32 - failed,
            failed,
            "Batch finished",
        );
        if failed > 0 {
            anyhow::bail!("{failed} of {} batch items failed", items.len());
        }
    } else {
        let artifacts = generator.generate(&request, cancel).await?;
        let saved = save_artifacts(&artifacts, &output_dir, request.seed, face_id_weight).await?;
        tracing::info!(count = saved.len(), dir = %output_dir.display(), "Artifacts saved");
    }

    Ok(())
}

/// An existing file path is read as raw bytes; anything else is
/// classified by prefix (URL, data URI, bare base64).
async fn resolve_reference(value: &str) -> anyhow::Result<ImageSource> {
    let path = Path::new(value);
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read reference image {value}"))?;
        return Ok(ImageSource::Bytes(bytes));
    }
    Ok(ImageSource::parse(value))
}

//! Typed node-graph workflow model and parameter patching.
//!
//! A workflow is a mapping from node id to node, each node carrying a
//! `class_type`, an `inputs` object, and optional display metadata.
//! Request parameters are injected by rewriting the inputs of nodes in
//! specific categories; the category classification lives in one place
//! ([`NodeCategory`]) instead of string comparisons scattered across
//! call sites.  Patching is idempotent and never touches unrelated
//! nodes.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use faceforge_core::artifact::basename;
use faceforge_core::request::WorkflowSource;

// ---------------------------------------------------------------------------
// Node class types and input keys
// ---------------------------------------------------------------------------

/// Class type of image-loading nodes.
pub const CLASS_LOAD_IMAGE: &str = "LoadImage";
/// Class type of text-encoding nodes.
pub const CLASS_TEXT_ENCODE: &str = "CLIPTextEncode";
/// Class type of face-identity conditioning nodes.
pub const CLASS_FACE_IDENTITY: &str = "ApplyPulidFlux";
/// Class type of noise-seed nodes.
pub const CLASS_NOISE_SEED: &str = "RandomNoise";

/// Marker in a text-encode node's title identifying the positive prompt.
pub const TITLE_POSITIVE_MARKER: &str = "Positive";

const INPUT_IMAGE: &str = "image";
const INPUT_TEXT: &str = "text";
const INPUT_WEIGHT: &str = "weight";
const INPUT_NOISE_SEED: &str = "noise_seed";

// ---------------------------------------------------------------------------
// Graph model
// ---------------------------------------------------------------------------

/// Patchable role a node plays in the graph, derived from its
/// `class_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    LoadImage,
    TextEncode,
    FaceIdentity,
    NoiseSeed,
    /// Any node the patcher does not touch.
    Other,
}

/// Display metadata attached to a node.  Unknown fields are preserved
/// so a patched graph round-trips byte-for-byte apart from the patched
/// inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single processing node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
    /// Fields this client does not model, carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowNode {
    /// Classify the node by its class type.
    pub fn category(&self) -> NodeCategory {
        match self.class_type.as_str() {
            CLASS_LOAD_IMAGE => NodeCategory::LoadImage,
            CLASS_TEXT_ENCODE => NodeCategory::TextEncode,
            CLASS_FACE_IDENTITY => NodeCategory::FaceIdentity,
            CLASS_NOISE_SEED => NodeCategory::NoiseSeed,
            _ => NodeCategory::Other,
        }
    }

    /// The node's display title, when present.
    pub fn title(&self) -> Option<&str> {
        self.meta.as_ref()?.title.as_deref()
    }

    /// Whether this is a text-encode node marked as the positive prompt.
    fn is_positive_text(&self) -> bool {
        self.title()
            .is_some_and(|title| title.contains(TITLE_POSITIVE_MARKER))
    }

    /// Replace an existing input value.  Inputs the node does not
    /// declare are left alone -- the engine defines the input schema,
    /// not this client.
    fn set_existing_input(&mut self, key: &str, value: serde_json::Value) {
        if let Some(slot) = self.inputs.get_mut(key) {
            *slot = value;
        }
    }
}

/// A declarative node-graph workflow, keyed by node id.
///
/// Node order is preserved as the document supplies it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    pub nodes: IndexMap<String, WorkflowNode>,
}

impl WorkflowGraph {
    /// Ids of all nodes in the given category, in graph order.
    pub fn ids_in_category(&self, category: NodeCategory) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.category() == category)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Patching
// ---------------------------------------------------------------------------

/// Request parameters injected into a workflow graph.
#[derive(Debug, Clone)]
pub struct PatchParams<'a> {
    pub prompt: &'a str,
    pub face_id_weight: f64,
    /// Injected only when supplied.
    pub seed: Option<u32>,
    /// Staged reference image; the basename replaces load-image inputs.
    pub reference_image: Option<&'a str>,
}

/// Inject request parameters into the graph.
///
/// Each rule applies independently; the absence of a matching node is
/// not an error.  Re-applying with the same parameters yields the same
/// graph.
pub fn patch_workflow(graph: &mut WorkflowGraph, params: &PatchParams<'_>) {
    if let Some(reference) = params.reference_image {
        let name = basename(reference).to_string();
        for id in graph.ids_in_category(NodeCategory::LoadImage) {
            if let Some(node) = graph.nodes.get_mut(&id) {
                node.set_existing_input(INPUT_IMAGE, name.clone().into());
            }
        }
    }

    for id in graph.ids_in_category(NodeCategory::TextEncode) {
        if let Some(node) = graph.nodes.get_mut(&id) {
            if node.is_positive_text() {
                node.set_existing_input(INPUT_TEXT, params.prompt.into());
            }
        }
    }

    for id in graph.ids_in_category(NodeCategory::FaceIdentity) {
        if let Some(node) = graph.nodes.get_mut(&id) {
            node.set_existing_input(INPUT_WEIGHT, params.face_id_weight.into());
        }
    }

    if let Some(seed) = params.seed {
        for id in graph.ids_in_category(NodeCategory::NoiseSeed) {
            if let Some(node) = graph.nodes.get_mut(&id) {
                node.set_existing_input(INPUT_NOISE_SEED, seed.into());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Source resolution
// ---------------------------------------------------------------------------

/// Errors resolving a workflow source into a graph.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Workflow is not a valid node graph: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to fetch workflow: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to download workflow ({status})")]
    Download { status: u16 },

    #[error("Failed to read workflow file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolve a [`WorkflowSource`] into a concrete graph.
///
/// URLs are fetched with the supplied client; paths are read from disk;
/// inline JSON parses in place.
pub async fn resolve_source(
    source: &WorkflowSource,
    client: &reqwest::Client,
) -> Result<WorkflowGraph, WorkflowError> {
    match source {
        WorkflowSource::Inline(value) => Ok(serde_json::from_value(value.clone())?),
        WorkflowSource::Json(text) => Ok(serde_json::from_str(text)?),
        WorkflowSource::Url(url) => {
            let response = client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(WorkflowError::Download {
                    status: status.as_u16(),
                });
            }
            Ok(response.json().await?)
        }
        WorkflowSource::Path(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| WorkflowError::Io {
                    path: path.clone(),
                    source,
                })?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

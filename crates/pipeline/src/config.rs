//! Injected configuration for the orchestration façade.
//!
//! All endpoint identity and credentials are resolved here, once, and
//! passed explicitly into the clients -- nothing reads the environment
//! after construction and there is no global credential state.
//!
//! # Environment variables (`from_env`)
//!
//! | Variable                  | Required        | Default                      |
//! |---------------------------|-----------------|------------------------------|
//! | `FACEFORGE_TARGET`        | no              | `local`                      |
//! | `ENGINE_URL`              | no              | `http://127.0.0.1:8188`      |
//! | `ENGINE_INPUT_DIR`        | no              | `/ComfyUI/input`             |
//! | `ENGINE_OUTPUT_DIR`       | no              | `/ComfyUI/output`            |
//! | `ENGINE_DEFAULT_WORKFLOW` | no              | bundled face-identity graph  |
//! | `REMOTE_API_BASE`         | no              | `https://api.runpod.ai`      |
//! | `REMOTE_ENDPOINT_ID`      | when remote     | --                           |
//! | `REMOTE_API_KEY`          | when remote     | --                           |

use std::path::PathBuf;
use std::time::Duration;

use faceforge_cloud::client::RemoteConfig;
use faceforge_comfyui::driver::EngineConfig;

/// Fixed delay between sequential batch items, protecting the remote
/// service from back-to-back submissions.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(3);

/// Which backend a generator routes requests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// The locally reachable engine.
    Local,
    /// The remote queue service.
    Remote,
}

/// Errors resolving the façade configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    #[error("{name} must be {expected}, got '{value}'")]
    InvalidVar {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Remote target selected but no remote endpoint is configured")]
    MissingRemote,
}

/// Full configuration for a [`Generator`](crate::generator::Generator).
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub target: ExecutionTarget,
    pub engine: EngineConfig,
    /// Required when `target` is [`ExecutionTarget::Remote`].
    pub remote: Option<RemoteConfig>,
    pub batch_delay: Duration,
}

impl GeneratorConfig {
    /// Configuration routing to a local engine.
    pub fn local(engine: EngineConfig) -> Self {
        Self {
            target: ExecutionTarget::Local,
            engine,
            remote: None,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Configuration routing to a remote endpoint.
    pub fn remote(remote: RemoteConfig) -> Self {
        Self {
            target: ExecutionTarget::Remote,
            engine: EngineConfig::default(),
            remote: Some(remote),
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Resolve the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let target = parse_target(
            &std::env::var("FACEFORGE_TARGET").unwrap_or_else(|_| "local".to_string()),
        )?;

        let mut engine = EngineConfig::default();
        if let Ok(url) = std::env::var("ENGINE_URL") {
            engine.base_url = url;
        }
        if let Ok(dir) = std::env::var("ENGINE_INPUT_DIR") {
            engine.input_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("ENGINE_OUTPUT_DIR") {
            engine.output_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("ENGINE_DEFAULT_WORKFLOW") {
            engine.default_workflow = Some(PathBuf::from(path));
        }

        let remote = match target {
            ExecutionTarget::Remote => {
                let endpoint_id = std::env::var("REMOTE_ENDPOINT_ID")
                    .map_err(|_| ConfigError::MissingVar("REMOTE_ENDPOINT_ID"))?;
                let api_key = std::env::var("REMOTE_API_KEY")
                    .map_err(|_| ConfigError::MissingVar("REMOTE_API_KEY"))?;

                let mut remote = RemoteConfig::new(endpoint_id, api_key);
                if let Ok(base) = std::env::var("REMOTE_API_BASE") {
                    remote.api_base = base;
                }
                Some(remote)
            }
            ExecutionTarget::Local => None,
        };

        Ok(Self {
            target,
            engine,
            remote,
            batch_delay: DEFAULT_BATCH_DELAY,
        })
    }
}

/// Parse an execution-target name.
pub fn parse_target(value: &str) -> Result<ExecutionTarget, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "local" => Ok(ExecutionTarget::Local),
        "remote" => Ok(ExecutionTarget::Remote),
        _ => Err(ConfigError::InvalidVar {
            name: "FACEFORGE_TARGET",
            expected: "'local' or 'remote'",
            value: value.to_string(),
        }),
    }
}

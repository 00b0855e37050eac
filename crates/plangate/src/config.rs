use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Behaviour of `enqueue` when the dispatch queue is at capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueMode {
    /// Block the caller until a slot frees up.
    #[default]
    Block,
    /// Fail the call immediately with a queue-full error.
    FailFast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Root directory for uploads and derived page images.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Number of worker consumers in the pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Bound of the dispatch queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub enqueue_mode: EnqueueMode,

    /// Resolution for page rasterization.
    #[serde(default = "default_page_image_dpi")]
    pub page_image_dpi: u32,

    /// Base URL of the remote inference endpoint.
    #[serde(default = "default_inference_endpoint")]
    pub inference_endpoint: String,

    #[serde(default = "default_model_version")]
    pub model_version: String,

    /// Per-call timeout for inference requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Total attempts per inference request (first try plus retries).
    #[serde(default = "default_max_request_attempts")]
    pub max_request_attempts: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Name of the environment variable holding the inference API key.
    /// The key itself never lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_queue_capacity() -> usize {
    64
}

fn default_page_image_dpi() -> u32 {
    300
}

fn default_inference_endpoint() -> String {
    "http://runpod-worker:8000".to_string()
}

fn default_model_version() -> String {
    "qwen2.5-vl-72b".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_request_attempts() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_api_key_env() -> String {
    "PLANGATE_API_KEY".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            enqueue_mode: EnqueueMode::default(),
            page_image_dpi: default_page_image_dpi(),
            inference_endpoint: default_inference_endpoint(),
            model_version: default_model_version(),
            request_timeout_secs: default_request_timeout_secs(),
            max_request_attempts: default_max_request_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Validation {
                message: "worker_count must be greater than zero".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "queue_capacity must be greater than zero".to_string(),
            });
        }
        if self.page_image_dpi == 0 {
            return Err(ConfigError::Validation {
                message: "page_image_dpi must be greater than zero".to_string(),
            });
        }
        if self.max_request_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "max_request_attempts must be greater than zero".to_string(),
            });
        }
        if self.inference_endpoint.is_empty() {
            return Err(ConfigError::Validation {
                message: "inference_endpoint must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolves the inference API key from the configured environment
    /// variable. Absent or empty means the endpoint is unauthenticated.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        match std::env::var(&self.api_key_env) {
            Ok(value) if !value.is_empty() => Some(SecretString::from(value)),
            _ => None,
        }
    }
}

/// Loads and validates a JSON config file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: GatewayConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

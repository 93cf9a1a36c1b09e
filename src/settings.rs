use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::services::{InferenceConfig, DEFAULT_MAX_ROUNDS};
use crate::infrastructure::embeddings::simple_engine::{
    DEFAULT_SIMPLE_DIMENSIONS, DEFAULT_SIMPLE_MODEL,
};
use crate::infrastructure::DEFAULT_ENDPOINT;

/// Default filename used for configuration within the data directory.
const CONFIG_FILENAME: &str = "config.json";

pub const ENV_MODEL_ID: &str = "COMPLAINTS_MODEL_ID";
pub const ENV_ENDPOINT: &str = "COMPLAINTS_ENDPOINT";
pub const ENV_BEARER_TOKEN: &str = "AWS_BEARER_TOKEN_BEDROCK";
pub const ENV_MAX_ROUNDS: &str = "COMPLAINTS_MAX_ROUNDS";

/// Embedding backend used to embed queries. Must match the backend the index
/// was built with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Deterministic hash embedder (always available, offline).
    Simple {
        #[serde(default = "default_simple_model")]
        model: String,
        #[serde(default = "default_simple_dim")]
        dimensions: usize,
    },
    /// Remote embedding model served next to the generative model.
    Bedrock {
        #[serde(default = "default_bedrock_embedding_model")]
        model: String,
        #[serde(default)]
        dimensions: Option<usize>,
    },
    /// Local ONNX embeddings (feature gated).
    #[cfg(feature = "fastembed-engine")]
    FastEmbed { model: String },
}

impl EmbeddingBackend {
    pub fn id(&self) -> &'static str {
        match self {
            EmbeddingBackend::Simple { .. } => "simple",
            EmbeddingBackend::Bedrock { .. } => "bedrock",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => "fastembed",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            EmbeddingBackend::Simple { model, .. } => model,
            EmbeddingBackend::Bedrock { model, .. } => model,
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { model } => model,
        }
    }
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        EmbeddingBackend::Simple {
            model: default_simple_model(),
            dimensions: default_simple_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub endpoint: String,
    pub model_id: String,
    /// Usually supplied through the environment rather than the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        let inference = InferenceConfig::default();
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model_id: "amazon.nova-pro-v1:0".to_string(),
            bearer_token: None,
            max_tokens: inference.max_tokens,
            temperature: inference.temperature,
            timeout_secs: 60,
        }
    }
}

impl GenerationSettings {
    pub fn inference(&self) -> InferenceConfig {
        InferenceConfig {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Ceiling applied to any requested result bound. The bound used when
    /// none is given is always [`crate::domain::DEFAULT_RESULT_BOUND`].
    pub max_bound: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { max_bound: 1_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestrationSettings {
    pub max_rounds: usize,
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

/// Complete configuration payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub embedding: EmbeddingBackend,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub orchestration: OrchestrationSettings,
}

impl AppConfig {
    /// Applies environment overrides on top of the file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(model_id) = non_empty(ENV_MODEL_ID) {
            self.generation.model_id = model_id;
        }
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.generation.endpoint = endpoint;
        }
        if let Some(token) = non_empty(ENV_BEARER_TOKEN) {
            self.generation.bearer_token = Some(token);
        }
        if let Some(raw) = non_empty(ENV_MAX_ROUNDS) {
            match raw.trim().parse::<usize>() {
                Ok(rounds) if rounds > 0 => self.orchestration.max_rounds = rounds,
                _ => warn!(
                    target: "complaint_rag::config",
                    value = %raw,
                    "ignoring invalid COMPLAINTS_MAX_ROUNDS"
                ),
            }
        }
        self
    }
}

/// Loads `AppConfig` once and hands out snapshots.
pub struct ConfigManager {
    path: PathBuf,
    state: RwLock<AppConfig>,
}

impl ConfigManager {
    /// Reads `<data_dir>/config.json`. A missing or unreadable file yields the
    /// defaults; environment overrides apply either way.
    pub fn load(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = data_dir.as_ref().join(CONFIG_FILENAME);
        let config = Self::read_file(&path).with_env_overrides();

        Ok(Self {
            path,
            state: RwLock::new(config),
        })
    }

    fn read_file(path: &Path) -> AppConfig {
        if !path.exists() {
            return AppConfig::default();
        }
        match fs::read(path)
            .map_err(|err| err.to_string())
            .and_then(|bytes| {
                serde_json::from_slice::<AppConfig>(&bytes).map_err(|err| err.to_string())
            })
        {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    target: "complaint_rag::config",
                    path = %path.display(),
                    error = %err,
                    "config unreadable, using defaults"
                );
                AppConfig::default()
            }
        }
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> AppConfig {
        self.state.read().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current configuration back to disk, creating the directory
    /// if needed. The bearer token is never persisted.
    pub fn persist(&self) -> std::io::Result<()> {
        let mut config = self.current();
        config.generation.bearer_token = None;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(&config)?;
        fs::write(&self.path, payload)
    }
}

fn default_simple_dim() -> usize {
    DEFAULT_SIMPLE_DIMENSIONS
}

fn default_simple_model() -> String {
    DEFAULT_SIMPLE_MODEL.to_string()
}

fn default_bedrock_embedding_model() -> String {
    "amazon.titan-embed-text-v2:0".to_string()
}

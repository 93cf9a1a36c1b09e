use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod settings;

#[cfg(test)]
mod testing;

use application::services::{
    EmbeddingEngine as EmbeddingEngineTrait, GenerativeModel, ServiceConfig, VectorStore,
};
use application::ComplaintService;
#[cfg(feature = "fastembed-engine")]
use infrastructure::FastEmbedEngine;
use infrastructure::{
    BedrockEmbedEngine, ConverseClient, EndpointConfig, SimpleEmbedEngine, SledVectorStore,
};
use settings::{AppConfig, ConfigManager, EmbeddingBackend};
use tracing::info;

pub const ENV_DATA_DIR: &str = "COMPLAINTS_DATA_DIR";
pub const ENV_LOG: &str = "COMPLAINTS_LOG";

/// Everything a front end needs, built once at startup.
pub struct AppHandles {
    pub service: Arc<ComplaintService>,
    pub config: Arc<ConfigManager>,
    pub data_dir: PathBuf,
}

/// Installs the global subscriber on stderr. Safe to call more than once.
pub fn init_tracing() {
    init_tracing_with_writer(std::io::stderr);
}

fn init_tracing_with_writer<W>(make_writer: fn() -> W)
where
    W: std::io::Write + Send + Sync + 'static,
{
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        let filter = std::env::var(ENV_LOG).unwrap_or_else(|_| "info".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(make_writer)
            .compact()
            .try_init();
    });
}

/// Opens the index and wires the service from the data directory's config.
pub fn build_environment() -> Result<AppHandles> {
    let data_dir = resolve_data_dir()?;

    let config = Arc::new(ConfigManager::load(&data_dir).context("failed to load config file")?);
    let active = config.current();

    let index_path = data_dir.join("index");
    let store: Arc<dyn VectorStore> = Arc::new(
        SledVectorStore::open(&index_path)
            .map_err(|err| anyhow!(err.to_string()))
            .context("failed to open complaint index")?,
    );

    let embedder = init_embedder(&active).context("failed to initialise embedding backend")?;
    let model = init_model(&active);

    let service_config = ServiceConfig {
        embedding_model: active.embedding.model_name().to_string(),
        max_bound: active.retrieval.max_bound,
        inference: active.generation.inference(),
        max_rounds: active.orchestration.max_rounds,
    };
    let service = Arc::new(ComplaintService::new(embedder, store, model, service_config));

    info!(
        target: "complaint_rag::bootstrap",
        data_dir = %data_dir.display(),
        embedding = active.embedding.id(),
        model_id = %active.generation.model_id,
        "environment ready"
    );

    Ok(AppHandles {
        service,
        config,
        data_dir,
    })
}

fn endpoint(config: &AppConfig) -> EndpointConfig {
    EndpointConfig::new(
        config.generation.endpoint.clone(),
        config.generation.bearer_token.clone(),
        Duration::from_secs(config.generation.timeout_secs.max(1)),
    )
}

fn init_model(config: &AppConfig) -> Arc<dyn GenerativeModel> {
    Arc::new(ConverseClient::new(
        endpoint(config),
        config.generation.model_id.clone(),
    ))
}

fn init_embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingEngineTrait>> {
    match &config.embedding {
        EmbeddingBackend::Simple { model, dimensions } => {
            let engine = SimpleEmbedEngine::try_new(model.clone(), *dimensions)
                .map_err(|err| anyhow!(err.to_string()))?;
            Ok(Arc::new(engine))
        }
        EmbeddingBackend::Bedrock { model, dimensions } => Ok(Arc::new(BedrockEmbedEngine::new(
            endpoint(config),
            model.clone(),
            *dimensions,
        ))),
        #[cfg(feature = "fastembed-engine")]
        EmbeddingBackend::FastEmbed { model } => {
            let engine = FastEmbedEngine::try_new(model).map_err(|err| anyhow!(err.to_string()))?;
            Ok(Arc::new(engine))
        }
    }
}

/// `COMPLAINTS_DATA_DIR` when set, otherwise the platform data directory.
pub fn resolve_data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(ENV_DATA_DIR).filter(|value| !value.is_empty()) {
        Some(raw) => PathBuf::from(raw),
        None => directories::ProjectDirs::from("com", "complaints", "ComplaintRag")
            .ok_or_else(|| anyhow!("unable to determine OS data dir"))?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&dir).context("failed to create data directory")?;
    Ok(dir)
}

/// Serves MCP over stdin/stdout (for IDEs and agents that spawn the process).
#[cfg(feature = "mcp-server")]
pub async fn run_mcp_stdio() -> Result<()> {
    init_tracing();

    let handles = build_environment().context("failed to bootstrap complaints environment")?;

    interfaces::mcp::run_mcp_stdio_server(handles.service)
        .await
        .context("MCP stdio server failed")?;

    Ok(())
}

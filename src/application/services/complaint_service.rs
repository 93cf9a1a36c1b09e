use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::answer_generator::AnswerGenerator;
use super::context_assembler::ContextAssembler;
use super::dispatcher::ToolDispatcher;
use super::extractor::FilterExtractor;
use super::orchestrator::{LoopConfig, Orchestrator};
use super::ports::{EmbeddingEngine, GenerativeModel, InferenceConfig, VectorStore};
use super::retriever::Retriever;
use crate::application::dtos::{AskResponse, AskStatus, HealthStatusResponse};
use crate::domain::{DomainError, Query};

/// High level configuration shared by the service and its adapters.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub embedding_model: String,
    pub max_bound: usize,
    pub inference: InferenceConfig,
    pub max_rounds: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            embedding_model: "complaints/simple-hash".into(),
            max_bound: 1_000,
            inference: InferenceConfig::default(),
            max_rounds: super::orchestrator::DEFAULT_MAX_ROUNDS,
        }
    }
}

impl ServiceConfig {
    pub fn with_model(embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            ..Self::default()
        }
    }
}

/// Immutable bundle of every pipeline component, built once at startup and
/// shared by reference for the life of the process.
pub struct ComplaintService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingEngine>,
    extractor: FilterExtractor,
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    orchestrator: Orchestrator,
    config: ServiceConfig,
}

impl ComplaintService {
    pub fn new(
        embedder: Arc<dyn EmbeddingEngine>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn GenerativeModel>,
        config: ServiceConfig,
    ) -> Self {
        let retriever = Retriever::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            config.embedding_model.clone(),
            config.max_bound,
        );
        Self {
            extractor: FilterExtractor::new(Arc::clone(&model), config.inference),
            generator: AnswerGenerator::new(Arc::clone(&model), config.inference),
            orchestrator: Orchestrator::new(
                model,
                LoopConfig::new(config.max_rounds, config.inference),
            ),
            assembler: ContextAssembler::new(),
            retriever,
            store,
            embedder,
            config,
        }
    }

    /// Answers through the tool-calling loop.
    pub fn ask(&self, query: &str) -> Result<AskResponse, DomainError> {
        let query = Query::new(query)?;
        let dispatcher = ToolDispatcher::new(
            &self.extractor,
            &self.retriever,
            &self.assembler,
            &self.generator,
        );

        let outcome = self.orchestrator.run(&query, &dispatcher)?;
        let answer = outcome.last_text();

        if outcome.is_complete() && answer.is_none() {
            return Err(DomainError::generation("final reply contained no text"));
        }

        Ok(AskResponse {
            query: query.to_string(),
            status: if outcome.is_complete() {
                AskStatus::Answered
            } else {
                AskStatus::Incomplete
            },
            answer,
            rounds: outcome.rounds,
        })
    }

    /// Fixed pipeline: extract filters, retrieve, assemble, answer. Any
    /// retrieval or generation failure is returned to the caller.
    pub fn ask_direct(&self, query: &str) -> Result<AskResponse, DomainError> {
        let query = Query::new(query)?;

        // the extractor always makes exactly one call
        let mut rounds = 1;
        let extraction = self.extractor.extract(query.as_str());
        let documents =
            self.retriever
                .retrieve(query.as_str(), extraction.filter.as_ref(), extraction.bound)?;
        let context = self.assembler.assemble(&documents);
        info!(
            target: "complaint_rag::direct",
            documents = context.len(),
            fell_back = extraction.fell_back,
            "context assembled"
        );
        if !context.is_empty() {
            rounds += 1;
        }
        let answer = self.generator.generate(query.as_str(), &context)?;

        Ok(AskResponse {
            query: query.to_string(),
            status: AskStatus::Answered,
            answer: Some(answer),
            rounds,
        })
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn embedding_dimensions(&self) -> Option<usize> {
        self.embedder.dims(&self.config.embedding_model)
    }

    pub fn health(&self) -> Result<HealthStatusResponse, DomainError> {
        self.store.ping()?;
        let indexed = self.store.len()?;

        Ok(HealthStatusResponse {
            ok: true,
            message: "ready".into(),
            details: Some(format!(
                "model: {}, dims: {}, complaints: {}, max_rounds: {}, checked_at: {}",
                self.config.embedding_model,
                self.embedding_dimensions()
                    .map_or_else(|| "unknown".to_string(), |dims| dims.to_string()),
                indexed,
                self.orchestrator.config().max_rounds,
                Utc::now()
            )),
        })
    }
}

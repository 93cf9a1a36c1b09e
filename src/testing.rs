//! Shared fixtures for unit tests: a scripted generative model and a small
//! seeded complaint index.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::application::services::{
    AnswerGenerator, ContextAssembler, ConverseRequest, EmbeddingEngine, FilterExtractor,
    GenerativeModel, InferenceConfig, Retriever, ToolDispatcher,
};
use crate::domain::{
    ComplaintEmbedding, ComplaintRecord, ContentBlock, Document, DomainError, Message,
    ToolUseBlock,
};
use crate::infrastructure::embeddings::simple_engine::DEFAULT_SIMPLE_MODEL;
use crate::infrastructure::{SimpleEmbedEngine, SledVectorStore};

/// Replays canned replies in order and records every request it receives.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Message, DomainError>>>,
    requests: Mutex<Vec<ConverseRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<Message, DomainError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn request(&self, index: usize) -> ConverseRequest {
        self.requests.lock()[index].clone()
    }
}

impl GenerativeModel for ScriptedModel {
    fn converse(&self, request: &ConverseRequest) -> Result<Message, DomainError> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(DomainError::generation("script exhausted")))
    }
}

pub const SEED_COMPLAINTS: &[(&str, &str, &str, &str)] = &[
    ("Acme Corp", "MC", "2024-01-12", "Card payment refused at the terminal twice."),
    ("Globex", "MC", "2024-03-05", "Monthly account fees charged twice in March."),
    ("Initech", "LC", "2024-02-20", "Wire transfer delayed by five business days."),
    ("Acme Corp", "ICB", "2024-04-18", "Relationship manager never returned calls."),
    ("Umbrella", "MC", "2024-07-01", "Payment delays on supplier invoices."),
    ("Globex", "LC", "2024-07-22", "Online banking locked after password reset."),
    ("Hooli", "ICB", "2024-08-09", "FX rate applied differs from the quoted rate."),
    ("Initech", "MC", "2024-09-14", "Card payment refused abroad without notice."),
    ("Stark Industries", "LC", "2024-05-30", "Overdraft fees applied despite agreement."),
    ("Wayne Enterprises", "ICB", "2024-10-02", "Statement missing several transactions."),
    ("Umbrella", "LC", "2024-11-19", "Payment delays on payroll batch."),
    ("Hooli", "MC", "2024-06-15", "Loan documents requested three times."),
];

/// Temporary index holding [`SEED_COMPLAINTS`] embedded with the default
/// hash engine.
pub fn seed_store() -> Arc<SledVectorStore> {
    let store = SledVectorStore::temporary().unwrap();
    let engine = SimpleEmbedEngine::default();

    for (client, region, date, text) in SEED_COMPLAINTS {
        let document = Document::new(
            *text,
            [
                ("client_name", *client),
                ("client_region", *region),
                ("complaint_date", *date),
            ],
        );
        let vector = engine.embed(DEFAULT_SIMPLE_MODEL, text).unwrap();
        store
            .append(&ComplaintRecord::new(
                document,
                ComplaintEmbedding::new(DEFAULT_SIMPLE_MODEL, vector),
            ))
            .unwrap();
    }

    Arc::new(store)
}

pub fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
    ContentBlock::ToolUse(ToolUseBlock {
        tool_use_id: id.to_string(),
        name: name.to_string(),
        input,
    })
}

/// Every tool collaborator wired against the seeded index and one model.
pub struct Pipeline {
    pub store: Arc<SledVectorStore>,
    pub extractor: FilterExtractor,
    pub retriever: Retriever,
    pub assembler: ContextAssembler,
    pub generator: AnswerGenerator,
}

impl Pipeline {
    pub fn dispatcher(&self) -> ToolDispatcher<'_> {
        ToolDispatcher::new(
            &self.extractor,
            &self.retriever,
            &self.assembler,
            &self.generator,
        )
    }
}

pub fn pipeline(model: Arc<ScriptedModel>) -> Pipeline {
    let store = seed_store();
    let inference = InferenceConfig::default();

    Pipeline {
        retriever: Retriever::new(
            Arc::new(SimpleEmbedEngine::default()),
            store.clone(),
            DEFAULT_SIMPLE_MODEL,
            1_000,
        ),
        extractor: FilterExtractor::new(model.clone(), inference),
        generator: AnswerGenerator::new(model, inference),
        assembler: ContextAssembler::new(),
        store,
    }
}

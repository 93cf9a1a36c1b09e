//! Service layer: pipeline components, the tool loop and the facade tying them together.

mod answer_generator;
mod complaint_service;
mod context_assembler;
mod dispatcher;
mod extractor;
mod orchestrator;
mod ports;
mod retriever;
pub mod tools;

pub use answer_generator::{AnswerGenerator, DONT_KNOW_ANSWER};
pub use complaint_service::{ComplaintService, ServiceConfig};
pub use context_assembler::{Context, ContextAssembler};
pub use dispatcher::{ToolDispatcher, ToolOutput};
pub use extractor::{Extraction, FilterExtractor};
pub use orchestrator::{LoopConfig, LoopOutcome, Orchestrator, Termination, DEFAULT_MAX_ROUNDS};
pub use ports::{
    ConverseRequest, EmbeddingEngine, GenerativeModel, InferenceConfig, ToolChoice, ToolSpec,
    VectorStore,
};
pub use retriever::Retriever;
pub use tools::{ToolInvocation, ToolKind};

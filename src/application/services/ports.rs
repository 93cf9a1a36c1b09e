use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ComplaintEmbedding, Document, DomainError, Message, MetadataFilter};

/// Abstraction over any embedding engine (hash, Bedrock, FastEmbed, ...).
pub trait EmbeddingEngine: Send + Sync {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError>;

    fn dims(&self, _model: &str) -> Option<usize> {
        None
    }
}

/// Read side of the pre-built complaint index.
pub trait VectorStore: Send + Sync {
    /// Ranked by descending similarity; equal scores keep index insertion order.
    fn search(
        &self,
        embedding: &ComplaintEmbedding,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<(Document, f32)>, DomainError>;

    fn len(&self) -> Result<usize, DomainError>;

    fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }

    fn ping(&self) -> Result<(), DomainError>;
}

/// Sampling knobs forwarded with every service call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.1,
        }
    }
}

/// Tool declaration offered to the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// The service decides whether to call a tool.
    Auto,
    /// The service must call the named tool.
    Tool(String),
}

/// One round-trip request to the generative service.
#[derive(Debug, Clone)]
pub struct ConverseRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub inference: InferenceConfig,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: Option<ToolChoice>,
}

impl ConverseRequest {
    pub fn new(
        system: impl Into<String>,
        messages: Vec<Message>,
        inference: InferenceConfig,
    ) -> Self {
        Self {
            system: system.into(),
            messages,
            inference,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = Some(choice);
        self
    }
}

/// Request/response boundary to the language-generation service.
pub trait GenerativeModel: Send + Sync {
    /// Returns the assistant turn produced for `request`.
    fn converse(&self, request: &ConverseRequest) -> Result<Message, DomainError>;
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Payload accepted from the CLI or MCP clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskRequest {
    /// Natural-language question about the complaints corpus.
    pub query: String,
    /// Skip the tool-calling loop and run the fixed extract, retrieve, answer pipeline.
    #[serde(default)]
    pub direct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AskStatus {
    /// The service produced a final answer.
    Answered,
    /// The round cap cut the conversation short; `answer` may be partial or absent.
    Incomplete,
}

/// Response envelope for `ask`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskResponse {
    pub query: String,
    pub status: AskStatus,
    pub answer: Option<String>,
    /// Top-level service calls: loop rounds for the tool-calling path; for the
    /// direct pipeline, the extraction call plus the answer call when one was made.
    pub rounds: usize,
}

impl AskResponse {
    pub fn is_complete(&self) -> bool {
        self.status == AskStatus::Answered
    }
}

/// Health/readiness report for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthStatusResponse {
    pub ok: bool,
    pub message: String,
    pub details: Option<String>,
}

//! Conversation turns exchanged with the generative service.
//!
//! The shapes follow the Converse message format: each turn is a role plus a
//! list of content blocks, where a block is plain text, a tool invocation
//! requested by the assistant, or a tool result returned by the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

/// Tool invocation requested by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseBlock {
    pub tool_use_id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

/// Outcome of one tool invocation, correlated by `tool_use_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: Vec<ToolResultContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolResultStatus>,
}

impl ToolResultBlock {
    pub fn json(tool_use_id: impl Into<String>, value: Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: vec![ToolResultContent::Json(value)],
            status: Some(ToolResultStatus::Success),
        }
    }

    pub fn text(tool_use_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: vec![ToolResultContent::Text(text.into())],
            status: Some(ToolResultStatus::Success),
        }
    }

    pub fn error(tool_use_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: vec![ToolResultContent::Text(description.into())],
            status: Some(ToolResultStatus::Error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Some(ToolResultStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolResultContent {
    Json(Value),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    /// Tool results travel back to the service in a user turn.
    pub fn tool_results(results: Vec<ToolResultBlock>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::ToolResult).collect(),
        }
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUseBlock> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        })
    }

    pub fn requests_tools(&self) -> bool {
        self.tool_uses().next().is_some()
    }

    /// Text blocks joined with newlines; `None` when the turn has no text.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n"))
    }
}

/// Append-only record of one loop invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn seeded(query: &str) -> Self {
        Self {
            messages: vec![Message::user_text(query)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blocks_use_converse_wire_shape() {
        let message = Message {
            role: Role::Assistant,
            content: vec![
                ContentBlock::Text("Let me look that up.".into()),
                ContentBlock::ToolUse(ToolUseBlock {
                    tool_use_id: "tooluse_1".into(),
                    name: "get_complaints_data".into(),
                    input: json!({"user_query": "late fees"}),
                }),
            ],
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "content": [
                    {"text": "Let me look that up."},
                    {"toolUse": {
                        "toolUseId": "tooluse_1",
                        "name": "get_complaints_data",
                        "input": {"user_query": "late fees"}
                    }}
                ]
            })
        );
    }

    #[test]
    fn error_results_carry_status() {
        let block = ToolResultBlock::error("t-9", "store unreachable");
        let value = serde_json::to_value(ContentBlock::ToolResult(block)).unwrap();
        assert_eq!(
            value,
            json!({"toolResult": {
                "toolUseId": "t-9",
                "content": [{"text": "store unreachable"}],
                "status": "error"
            }})
        );
    }

    #[test]
    fn text_joins_only_text_blocks() {
        let message: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": [
                {"text": "first"},
                {"toolUse": {"toolUseId": "a", "name": "x", "input": {}}},
                {"text": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(message.text().as_deref(), Some("first\nsecond"));
        assert!(message.requests_tools());
        assert!(Message::tool_results(vec![]).text().is_none());
    }
}

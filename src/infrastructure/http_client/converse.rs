//! Generative-service adapter speaking the Converse wire format.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::{describe_http_error, EndpointConfig};
use crate::application::services::{ConverseRequest, GenerativeModel, ToolChoice, ToolSpec};
use crate::domain::{ContentBlock, DomainError, Message, Role};

/// Blocking client for `POST /model/{id}/converse`.
pub struct ConverseClient {
    endpoint: EndpointConfig,
    model_id: String,
    agent: ureq::Agent,
}

impl ConverseClient {
    pub fn new(endpoint: EndpointConfig, model_id: impl Into<String>) -> Self {
        let agent = endpoint.agent();
        Self {
            endpoint,
            model_id: model_id.into(),
            agent,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    role: Role,
    #[serde(default)]
    content: Vec<Value>,
}

impl GenerativeModel for ConverseClient {
    fn converse(&self, request: &ConverseRequest) -> Result<Message, DomainError> {
        let url = self.endpoint.model_url(&self.model_id, "converse");
        let body = request_body(request);
        trace!(target: "complaint_rag::converse", %url, body = %body, "sending converse request");

        let response = self
            .endpoint
            .post(&self.agent, &url)
            .send_json(body)
            .map_err(|err| DomainError::generation(describe_http_error(err)))?;

        let reply: Value = response
            .into_json()
            .map_err(|err| DomainError::generation(format!("malformed converse reply: {err}")))?;
        let message = parse_reply(reply)?;
        debug!(
            target: "complaint_rag::converse",
            model = %self.model_id(),
            blocks = message.content.len(),
            "converse reply received"
        );

        Ok(message)
    }
}

/// Unwraps `output.message` from a reply body.
fn parse_reply(body: Value) -> Result<Message, DomainError> {
    let parsed: ConverseResponse = serde_json::from_value(body)
        .map_err(|err| DomainError::generation(format!("malformed converse reply: {err}")))?;

    let raw = parsed
        .output
        .message
        .ok_or_else(|| DomainError::generation("converse reply carried no message"))?;
    trace!(
        target: "complaint_rag::converse",
        stop_reason = parsed.stop_reason.as_deref().unwrap_or("unknown"),
        "reply envelope parsed"
    );

    Ok(into_message(raw))
}

/// Keeps the block kinds this crate understands; others (reasoning traces,
/// images, ...) are dropped.
fn into_message(raw: RawMessage) -> Message {
    let content = raw
        .content
        .into_iter()
        .filter_map(|block| match serde_json::from_value::<ContentBlock>(block) {
            Ok(block) => Some(block),
            Err(err) => {
                debug!(
                    target: "complaint_rag::converse",
                    error = %err,
                    "skipping unsupported content block"
                );
                None
            }
        })
        .collect();
    Message {
        role: raw.role,
        content,
    }
}

fn request_body(request: &ConverseRequest) -> Value {
    let mut body = json!({
        "messages": request.messages,
        "system": [{ "text": request.system }],
        "inferenceConfig": request.inference,
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request.tools.iter().map(tool_entry).collect();
        let mut tool_config = json!({ "tools": tools });
        match &request.tool_choice {
            Some(ToolChoice::Auto) => tool_config["toolChoice"] = json!({ "auto": {} }),
            Some(ToolChoice::Tool(name)) => {
                tool_config["toolChoice"] = json!({ "tool": { "name": name } })
            }
            None => {}
        }
        body["toolConfig"] = tool_config;
    }

    body
}

fn tool_entry(spec: &ToolSpec) -> Value {
    json!({
        "toolSpec": {
            "name": spec.name,
            "description": spec.description,
            "inputSchema": { "json": spec.input_schema },
        }
    })
}

use serde::Deserialize;
use serde_json::json;

use crate::{
    application::services::EmbeddingEngine,
    domain::DomainError,
    infrastructure::http_client::{describe_http_error, EndpointConfig},
};

/// Remote embedder calling a Titan-style `invoke` endpoint
/// (`{"inputText": ...}` in, `{"embedding": [...]}` out).
pub struct BedrockEmbedEngine {
    endpoint: EndpointConfig,
    model_id: String,
    dimensions: Option<usize>,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    embedding: Vec<f32>,
}

impl BedrockEmbedEngine {
    pub fn new(
        endpoint: EndpointConfig,
        model_id: impl Into<String>,
        dimensions: Option<usize>,
    ) -> Self {
        let agent = endpoint.agent();
        Self {
            endpoint,
            model_id: model_id.into(),
            dimensions,
            agent,
        }
    }
}

impl EmbeddingEngine for BedrockEmbedEngine {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        if !model.eq_ignore_ascii_case(&self.model_id) {
            return Err(DomainError::embedding(format!(
                "engine initialised for `{}` but `{}` requested",
                self.model_id, model
            )));
        }
        if text.trim().is_empty() {
            return Err(DomainError::validation("text payload cannot be empty"));
        }

        let mut body = json!({ "inputText": text });
        if let Some(dimensions) = self.dimensions {
            body["dimensions"] = json!(dimensions);
        }

        let url = self.endpoint.model_url(&self.model_id, "invoke");
        let response: InvokeResponse = self
            .endpoint
            .post(&self.agent, &url)
            .send_json(body)
            .map_err(|err| DomainError::embedding(describe_http_error(err)))?
            .into_json()
            .map_err(|err| DomainError::embedding(format!("malformed embedding reply: {err}")))?;

        if let Some(expected) = self.dimensions {
            if response.embedding.len() != expected {
                return Err(DomainError::embedding(format!(
                    "unexpected embedding dimension (expected {}, got {})",
                    expected,
                    response.embedding.len()
                )));
            }
        }

        Ok(response.embedding)
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        self.dimensions
    }
}

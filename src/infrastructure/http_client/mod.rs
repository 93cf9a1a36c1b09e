//! HTTP plumbing shared by the Bedrock-style adapters.
//!
//! Both the generative client and the remote embedder talk to a
//! `bedrock-runtime` compatible endpoint with bearer-token authentication.

mod converse;

pub use converse::ConverseClient;

use std::time::Duration;

use serde::Deserialize;

/// Default runtime endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://bedrock-runtime.us-east-1.amazonaws.com";

/// Connection settings for a `bedrock-runtime` compatible endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.filter(|token| !token.trim().is_empty()),
            timeout,
        }
    }

    /// `{base}/model/{model_id}/{action}` with the model id path-encoded,
    /// since ARNs and inference-profile ids contain `:` and `/`.
    pub fn model_url(&self, model_id: &str, action: &str) -> String {
        format!(
            "{}/model/{}/{}",
            self.base_url,
            urlencoding::encode(model_id),
            action
        )
    }

    pub fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new().timeout(self.timeout).build()
    }

    pub fn post(&self, agent: &ureq::Agent, url: &str) -> ureq::Request {
        let request = agent
            .post(url)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json");
        match &self.bearer_token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }
}

/// Error body returned by the runtime API.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "Message")]
    message: String,
}

/// Flatten a ureq error into a readable description.
pub fn describe_http_error(error: ureq::Error) -> String {
    match error {
        ureq::Error::Status(code, response) => match response.into_json::<ErrorResponse>() {
            Ok(body) => format!("HTTP {code}: {}", body.message),
            Err(_) => format!("HTTP error: {code}"),
        },
        ureq::Error::Transport(transport) => format!("transport error: {transport}"),
    }
}

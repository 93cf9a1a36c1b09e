//! Infrastructure layer wiring concrete adapters (embeddings, storage, service clients).

pub mod embeddings;
pub mod http_client;
pub mod storage;

pub use embeddings::BedrockEmbedEngine;
#[cfg(feature = "fastembed-engine")]
pub use embeddings::FastEmbedEngine;
pub use embeddings::SimpleEmbedEngine;
pub use http_client::{ConverseClient, EndpointConfig, DEFAULT_ENDPOINT};
pub use storage::SledVectorStore;

pub mod bedrock_engine;
pub mod simple_engine;

#[cfg(feature = "fastembed-engine")]
pub mod fastembed_engine;

pub use bedrock_engine::BedrockEmbedEngine;
#[cfg(feature = "fastembed-engine")]
pub use fastembed_engine::FastEmbedEngine;
pub use simple_engine::SimpleEmbedEngine;

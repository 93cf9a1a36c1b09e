//! Domain layer: complaint documents, filters and conversation turns.

pub mod conversation;
pub mod errors;
pub mod filter;
pub mod models;

pub use conversation::{
    ContentBlock, Conversation, Message, Role, ToolResultBlock, ToolResultContent,
    ToolResultStatus, ToolUseBlock,
};
pub use errors::DomainError;
pub use filter::{Comparison, FieldConstraint, FilterField, MetadataFilter};
pub use models::{
    ComplaintEmbedding, ComplaintRecord, Document, Query, ResultBound, COMPLAINT_TEXT_FIELD,
    DEFAULT_RESULT_BOUND, MAX_QUERY_CHARS,
};

//! Protocol adapters exposing `ComplaintService` to external clients.

#[cfg(feature = "mcp-server")]
pub mod mcp;

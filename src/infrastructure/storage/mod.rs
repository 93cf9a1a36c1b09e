//! Storage adapters for the complaint index.

pub mod sled_store;

pub use sled_store::SledVectorStore;

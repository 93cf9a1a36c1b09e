use std::sync::Arc;

use tracing::debug;

use super::ports::{EmbeddingEngine, VectorStore};
use crate::domain::{ComplaintEmbedding, Document, DomainError, MetadataFilter, ResultBound};

/// Similarity search over the complaint index, narrowed by metadata.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingEngine>,
    store: Arc<dyn VectorStore>,
    embedding_model: String,
    max_bound: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingEngine>,
        store: Arc<dyn VectorStore>,
        embedding_model: impl Into<String>,
        max_bound: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            embedding_model: embedding_model.into(),
            max_bound: max_bound.max(1),
        }
    }

    pub fn retrieve(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        bound: ResultBound,
    ) -> Result<Vec<Document>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("retrieval query cannot be empty"));
        }

        let filter = filter.filter(|f| !f.is_empty());
        let limit = bound.clamp_to(self.max_bound).get();

        let vector = self.embedder.embed(&self.embedding_model, query.trim())?;
        let embedding = ComplaintEmbedding::new(&self.embedding_model, vector);
        let matches = self.store.search(&embedding, filter, limit)?;

        debug!(
            target: "complaint_rag::retrieval",
            filtered = filter.is_some(),
            limit,
            returned = matches.len(),
            top_score = matches.first().map(|(_, score)| *score),
            "retrieval finished"
        );

        Ok(matches.into_iter().map(|(document, _)| document).collect())
    }

    /// Same as [`Retriever::retrieve`] with the filter still in raw JSON form,
    /// as supplied by the service. Invalid filters are rejected, not ignored.
    pub fn retrieve_raw(
        &self,
        query: &str,
        raw_filter: Option<&serde_json::Value>,
        bound: ResultBound,
    ) -> Result<Vec<Document>, DomainError> {
        let filter = raw_filter.map(MetadataFilter::from_json).transpose()?;
        self.retrieve(query, filter.as_ref(), bound)
    }
}

use std::path::Path;

use bincode::Options;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use sled::{Config, Db, IVec, Tree};

use crate::{
    application::services::VectorStore,
    domain::{ComplaintEmbedding, ComplaintRecord, Document, DomainError, MetadataFilter},
};

const COMPLAINTS_TREE: &str = "complaints";

/// Embedded complaint index backed by `sled`.
///
/// Records are stored whole under a big-endian insertion sequence, so a tree
/// scan yields them in the order they were indexed. Similarity is brute-force
/// cosine over the filtered records.
pub struct SledVectorStore {
    db: Db,
    complaints: Tree,
    write_lock: Mutex<()>,
}

impl SledVectorStore {
    /// Opens (or creates) the index rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|err| {
            DomainError::storage(format!("failed to create index directory {dir:?}: {err}"))
        })?;

        let db = Config::default()
            .path(dir)
            .cache_capacity(64 * 1024 * 1024)
            .mode(sled::Mode::LowSpace)
            .open()
            .map_err(|err| DomainError::storage(format!("failed to open sled db: {err}")))?;

        Self::from_db(db)
    }

    /// In-memory index removed on drop. Used by tests and dry runs.
    pub fn temporary() -> Result<Self, DomainError> {
        let db = Config::new()
            .temporary(true)
            .open()
            .map_err(|err| DomainError::storage(format!("failed to open temporary db: {err}")))?;

        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, DomainError> {
        let complaints = db
            .open_tree(COMPLAINTS_TREE)
            .map_err(|err| DomainError::storage(format!("failed to open complaints tree: {err}")))?;

        Ok(Self {
            db,
            complaints,
            write_lock: Mutex::new(()),
        })
    }

    /// Appends a record after every record already indexed.
    pub fn append(&self, record: &ComplaintRecord) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock();

        let sequence = self
            .db
            .generate_id()
            .map_err(|err| DomainError::storage(format!("failed to allocate record key: {err}")))?;
        let bytes = Self::serialize(record)?;

        self.complaints
            .insert(sequence.to_be_bytes(), bytes)
            .map_err(|err| DomainError::storage(format!("failed to append complaint: {err}")))?;
        self.complaints
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush complaints: {err}")))?;

        Ok(())
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, DomainError> {
        bincode::options()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .serialize(value)
            .map_err(|err| DomainError::storage(format!("serialization error: {err}")))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DomainError> {
        bincode::options()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .deserialize(bytes)
            .map_err(|err| DomainError::storage(format!("deserialization error: {err}")))
    }

    fn decode_record(bytes: &IVec) -> Result<ComplaintRecord, DomainError> {
        Self::deserialize(bytes.as_ref())
    }

    /// Zero-norm vectors score 0 rather than failing the whole search.
    fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, DomainError> {
        if query.len() != candidate.len() {
            return Err(DomainError::embedding(format!(
                "embedding dimension mismatch: query {} vs indexed {}",
                query.len(),
                candidate.len()
            )));
        }

        let mut dot = 0.0f32;
        let mut q_norm = 0.0f32;
        let mut c_norm = 0.0f32;

        for (q, c) in query.iter().zip(candidate.iter()) {
            dot += q * c;
            q_norm += q * q;
            c_norm += c * c;
        }

        let denom = q_norm.sqrt() * c_norm.sqrt();
        if denom == 0.0 {
            return Ok(0.0);
        }

        Ok((dot / denom).clamp(-1.0, 1.0))
    }
}

impl VectorStore for SledVectorStore {
    fn search(
        &self,
        embedding: &ComplaintEmbedding,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<(Document, f32)>, DomainError> {
        let mut scored: Vec<(Document, f32)> = Vec::new();

        for entry in self.complaints.iter() {
            let (_, value) = entry.map_err(|err| {
                DomainError::storage(format!("failed to read complaint record: {err}"))
            })?;
            let record = Self::decode_record(&value)?;

            if let Some(filter) = filter {
                if !filter.matches(&record.document) {
                    continue;
                }
            }

            let score = Self::cosine_similarity(&embedding.vector, &record.embedding.vector)?;
            scored.push((record.document, score));
        }

        // stable: ties keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        Ok(scored)
    }

    fn len(&self) -> Result<usize, DomainError> {
        Ok(self.complaints.len())
    }

    fn ping(&self) -> Result<(), DomainError> {
        self.db
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush db: {err}")))?;

        Ok(())
    }
}

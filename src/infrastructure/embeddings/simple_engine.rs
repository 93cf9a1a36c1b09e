use ahash::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use crate::{application::services::EmbeddingEngine, domain::DomainError};

pub const DEFAULT_SIMPLE_MODEL: &str = "complaints/simple-hash";
pub const DEFAULT_SIMPLE_DIMENSIONS: usize = 256;

/// Fixed hasher keys. Vectors are persisted in the index, so a token must land
/// in the same bucket in every process.
const TOKEN_HASH_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

fn token_hasher() -> RandomState {
    let [k0, k1, k2, k3] = TOKEN_HASH_SEEDS;
    RandomState::with_seeds(k0, k1, k2, k3)
}

/// A lightweight, deterministic embedding engine that hashes lowercase tokens
/// into a fixed-size vector. Not meant for production-grade semantic search,
/// but it keeps the pipeline usable offline and makes ranking reproducible in
/// tests. Token buckets come from a fixed-key hasher, so an index written by
/// one run is searchable by the next.
pub struct SimpleEmbedEngine {
    model_name: String,
    dimensions: usize,
    hasher: RandomState,
}

impl SimpleEmbedEngine {
    pub fn try_new(model_name: impl Into<String>, dimensions: usize) -> Result<Self, DomainError> {
        if dimensions == 0 {
            return Err(DomainError::validation(
                "embedding dimensions must be greater than zero",
            ));
        }
        Ok(Self {
            model_name: model_name.into(),
            dimensions: dimensions.clamp(8, 4096),
            hasher: token_hasher(),
        })
    }

    fn tokenize<'a>(&self, text: &'a str) -> impl Iterator<Item = &'a str> {
        text.split(|c: char| c.is_ascii_whitespace() || c.is_ascii_punctuation())
            .filter(move |token| !token.is_empty())
    }

    fn hash_token(&self, token: &str) -> usize {
        let mut hasher = self.hasher.build_hasher();
        token.to_lowercase().hash(&mut hasher);
        hasher.finish() as usize
    }

    fn embed_internal(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in self.tokenize(text) {
            vector[self.hash_token(token) % self.dimensions] += 1.0;
        }

        // L2 normalize to keep scores in [-1, 1]
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

impl Default for SimpleEmbedEngine {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_SIMPLE_MODEL.to_string(),
            dimensions: DEFAULT_SIMPLE_DIMENSIONS,
            hasher: token_hasher(),
        }
    }
}

impl EmbeddingEngine for SimpleEmbedEngine {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        if !model.eq_ignore_ascii_case(&self.model_name) {
            return Err(DomainError::embedding(format!(
                "engine initialised for `{}` but `{}` requested",
                self.model_name, model
            )));
        }
        if text.trim().is_empty() {
            return Err(DomainError::validation("text payload cannot be empty"));
        }
        Ok(self.embed_internal(text))
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        Some(self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let engine = SimpleEmbedEngine::default();
        let a = engine.embed(DEFAULT_SIMPLE_MODEL, "Late fee on invoice").unwrap();
        let b = engine.embed(DEFAULT_SIMPLE_MODEL, "late FEE on invoice").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_SIMPLE_DIMENSIONS);
    }

    fn payment_bucket(engine: &SimpleEmbedEngine) -> usize {
        engine
            .embed(DEFAULT_SIMPLE_MODEL, "payment")
            .unwrap()
            .iter()
            .position(|value| *value > 0.0)
            .unwrap()
    }

    #[test]
    fn token_bucket_follows_fixed_keys() {
        let expected = token_hasher().hash_one("payment") as usize % DEFAULT_SIMPLE_DIMENSIONS;
        assert_eq!(payment_bucket(&SimpleEmbedEngine::default()), expected);

        let other = SimpleEmbedEngine::try_new(DEFAULT_SIMPLE_MODEL, DEFAULT_SIMPLE_DIMENSIONS)
            .unwrap();
        assert_eq!(payment_bucket(&other), expected);
    }

    const CHILD_ENV: &str = "COMPLAINT_RAG_BUCKET_CHILD";
    const TEST_PATH: &str =
        "infrastructure::embeddings::simple_engine::tests::token_bucket_is_stable_across_processes";

    #[test]
    fn token_bucket_is_stable_across_processes() {
        let bucket = payment_bucket(&SimpleEmbedEngine::default());
        if std::env::var_os(CHILD_ENV).is_some() {
            println!("bucket={bucket}");
            return;
        }

        let output = std::process::Command::new(std::env::current_exe().unwrap())
            .args([TEST_PATH, "--exact", "--nocapture", "--test-threads=1", "-q"])
            .env(CHILD_ENV, "1")
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        let child = stdout
            .lines()
            .find_map(|line| line.trim().strip_prefix("bucket="))
            .and_then(|raw| raw.parse::<usize>().ok())
            .expect("child process reports its bucket");
        assert_eq!(child, bucket);
    }

    #[test]
    fn rejects_foreign_model_and_empty_text() {
        let engine = SimpleEmbedEngine::default();
        assert!(engine.embed("titan", "text").is_err());
        assert!(engine.embed(DEFAULT_SIMPLE_MODEL, "  ").is_err());
        assert!(SimpleEmbedEngine::try_new("m", 0).is_err());
    }
}

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

/// Bound applied when the caller (or the extractor) does not name one.
pub const DEFAULT_RESULT_BOUND: usize = 100;

/// Column name carrying the complaint body in assembled contexts.
pub const COMPLAINT_TEXT_FIELD: &str = "complaint_text";

/// Longest query accepted, in characters.
pub const MAX_QUERY_CHARS: usize = 4_000;

/// User question as submitted to the pipeline. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    pub fn new(text: impl Into<String>) -> Result<Self, DomainError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::validation("query cannot be empty"));
        }
        let length = text.chars().count();
        if length > MAX_QUERY_CHARS {
            return Err(DomainError::limit(format!(
                "query is {length} characters, the maximum is {MAX_QUERY_CHARS}"
            )));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upper limit on the number of documents a retrieval may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultBound(usize);

impl ResultBound {
    /// Returns `None` for zero; a bound is always positive.
    pub fn new(value: usize) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Lenient parse used on service-produced payloads: integers and integer
    /// strings are accepted, anything else yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(number) => number
                .as_u64()
                .or_else(|| {
                    number
                        .as_f64()
                        .filter(|f| f.fract() == 0.0 && *f > 0.0)
                        .map(|f| f as u64)
                })
                .and_then(|n| usize::try_from(n).ok())
                .and_then(Self::new),
            serde_json::Value::String(raw) => {
                raw.trim().parse::<usize>().ok().and_then(Self::new)
            }
            _ => None,
        }
    }

    pub fn clamp_to(self, ceiling: usize) -> Self {
        Self(self.0.min(ceiling.max(1)))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for ResultBound {
    fn default() -> Self {
        Self(DEFAULT_RESULT_BOUND)
    }
}

/// A retrieved complaint: body text plus an open set of metadata fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(
        text: impl Into<String>,
        metadata: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            metadata: metadata
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).map(String::as_str)
    }
}

/// Vector representation of a complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintEmbedding {
    pub model: String,
    pub vector: Vec<f32>,
}

impl ComplaintEmbedding {
    pub fn new(model: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            model: model.into(),
            vector,
        }
    }

    pub fn dims(&self) -> usize {
        self.vector.len()
    }
}

/// Stored index entry: the document and the vector it was indexed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub document: Document,
    pub embedding: ComplaintEmbedding,
}

impl ComplaintRecord {
    pub fn new(document: Document, embedding: ComplaintEmbedding) -> Self {
        Self {
            document,
            embedding,
        }
    }
}

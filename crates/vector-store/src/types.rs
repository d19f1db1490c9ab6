use codequery_code_chunker::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to one vector in a similarity index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(pub u64);

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for VectorId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: VectorId,
    pub document: Document,
    /// Cosine similarity to the query
    pub score: f32,
}

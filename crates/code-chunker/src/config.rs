use serde::{Deserialize, Serialize};

/// Configuration for turning source files into documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum piece length in characters (soft limit for unsplittable text)
    pub chunk_size: usize,

    /// Characters carried over between consecutive pieces
    pub chunk_overlap: usize,

    /// Prepend a method's leading comment to its content
    pub include_doc_comments: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 128,
            include_doc_comments: true,
        }
    }
}

impl ParserConfig {
    /// Pieces small enough that every method is split; handy in tests.
    pub fn with_chunk_size(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }

        Ok(())
    }
}

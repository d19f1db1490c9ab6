use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// No persisted index or cache exists yet; a full build recovers.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persisted state exists but cannot be trusted
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// The index rejected an add or delete; the index is unchanged
    #[error("Index mutation rejected: {0}")]
    IndexMutation(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl VectorStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

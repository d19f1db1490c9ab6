use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] codequery_code_chunker::ChunkerError),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] codequery_vector_store::VectorStoreError),

    /// git could not report a commit for the file
    #[error("Commit hash unavailable for {filename}: {reason}")]
    CommitHashUnavailable { filename: String, reason: String },

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub fn hash_unavailable(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommitHashUnavailable {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// No persisted index or cache exists yet
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VectorStoreError(e) if e.is_not_found())
    }
}

use thiserror::Error;

/// Result type for parsing operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors raised while turning source files into documents
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Tree-sitter produced no tree for the source
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No extractor is registered for the language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Invalid parser or splitter configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Grammar could not be loaded into the parser
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ChunkerError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}

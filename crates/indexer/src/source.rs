use crate::error::Result;
use async_trait::async_trait;
use codequery_code_chunker::{Document, DocumentParser, ParserConfig};
use std::path::{Path, PathBuf};

/// Produces the documents of one file
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// `filename` is repository-relative. Every returned document is tagged
    /// with `filename` and `commit_hash`.
    async fn parse_file(&self, filename: &str, commit_hash: Option<&str>) -> Result<Vec<Document>>;
}

/// Reads files below a root directory and parses them
pub struct RepositorySource {
    root: PathBuf,
    parser: DocumentParser,
}

impl RepositorySource {
    pub fn new(root: impl Into<PathBuf>, config: ParserConfig) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            parser: DocumentParser::new(config)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentSource for RepositorySource {
    async fn parse_file(&self, filename: &str, commit_hash: Option<&str>) -> Result<Vec<Document>> {
        if !self.parser.supports(filename) {
            return Ok(Vec::new());
        }
        let bytes = tokio::fs::read(self.root.join(filename)).await?;
        let source = String::from_utf8_lossy(&bytes);
        Ok(self.parser.parse_source(&source, filename, commit_hash)?)
    }
}

//! # Codequery Indexer
//!
//! Keeps a similarity index of method-level documents in step with a git
//! working tree, re-embedding only the files whose last commit changed.
//!
//! ## Pipeline
//!
//! ```text
//! Repository
//!     │
//!     ├──> FileScanner (.gitignore aware)
//!     │      └─> current filenames
//!     │
//!     ├──> CommitHashSource (git log -n 1 -- <file>)
//!     │      └─> unchanged files are skipped
//!     │
//!     ├──> DocumentSource (tree-sitter chunker)
//!     │      └─> Document[] for new and modified files
//!     │
//!     └──> Synchronizer
//!            ├─> add new vectors, then delete the replaced ones
//!            ├─> drop files that disappeared
//!            └─> persist index + cache
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use codequery_code_chunker::ParserConfig;
//! use codequery_indexer::{Collaborators, FileScanner, GitRepository, RepositorySource, Synchronizer};
//! use codequery_vector_store::{StateLayout, StubEmbedder};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let git = GitRepository::discover(".").await?;
//!     let files = FileScanner::new(git.root()).scan();
//!     let collaborators = Collaborators {
//!         embedder: Arc::new(StubEmbedder::default()),
//!         source: Arc::new(RepositorySource::new(git.root(), ParserConfig::default())?),
//!         hashes: Arc::new(git.clone()),
//!     };
//!
//!     let layout = StateLayout::from_env()?;
//!     let mut sync = Synchronizer::open_or_build(git.name(), layout, collaborators, &files).await?;
//!     let report = sync.sync(&files).await?;
//!     println!("{report}");
//!
//!     for hit in sync.similarity_search("parse the config file", 5).await? {
//!         println!("{} ({:.3})", hit.document.filename(), hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod git;
mod scanner;
mod source;
mod stats;
mod synchronizer;

pub use error::{IndexerError, Result};
pub use git::{CommitHashSource, GitRepository};
pub use scanner::FileScanner;
pub use source::{DocumentSource, RepositorySource};
pub use stats::SyncReport;
pub use synchronizer::{Collaborators, Inconsistency, Synchronizer};

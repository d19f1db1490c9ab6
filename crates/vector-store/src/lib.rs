//! # Codequery Vector Store
//!
//! Vector storage for method-level code documents, plus the per-file cache
//! that records which vectors belong to which file at which commit.
//!
//! ## Architecture
//!
//! ```text
//! Document[]
//!     │
//!     ├──> Embedder (StubEmbedder | HttpEmbedder)
//!     │      └─> Vec<f32>
//!     │
//!     ├──> SimilarityIndex (FlatIndex, exact cosine)
//!     │      ├─> add_documents → VectorId[]
//!     │      ├─> delete(VectorId[])
//!     │      └─> search / MMR search
//!     │
//!     └──> Persistent state (StateLayout)
//!            ├─> <name>.index.json   (index)
//!            └─> <name>.json         (CacheStore: filename → CacheRecord)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use codequery_code_chunker::Document;
//! use codequery_vector_store::{Embedder, FlatIndex, SimilarityIndex, StubEmbedder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = StubEmbedder::new(64);
//!     let mut index = FlatIndex::new(embedder.dimension());
//!
//!     let doc = Document::new("fn parse() {}", "src/lib.rs", Some("parse".into()), None);
//!     let vector = embedder.embed(&doc.content).await?;
//!     index.add_documents(vec![(doc, vector)])?;
//!
//!     let query = embedder.embed("parse input").await?;
//!     for hit in index.search(&query, 5)? {
//!         println!("{}: {:.3}", hit.document.filename(), hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod embeddings;
mod error;
mod flat_index;
pub mod mmr;
mod paths;
mod types;

pub use cache::{CacheRecord, CacheStore, VectorCache};
pub use codequery_code_chunker::{Document, DocumentMetadata};
pub use embeddings::{cosine_similarity, Embedder, HttpEmbedder, HttpEmbedderConfig, StubEmbedder};
pub use error::{Result, VectorStoreError};
pub use flat_index::{FlatIndex, IdPolicy, SimilarityIndex, FLAT_INDEX_SCHEMA_VERSION};
pub use paths::{default_state_dir, validate_name, StateLayout, STATE_DIR_ENV, STATE_DIR_NAME};
pub use types::{SearchHit, VectorId};

//! # Codequery Code Chunker
//!
//! Turns source files into method-level [`Document`]s for embedding.
//!
//! ## Architecture
//!
//! ```text
//! Source file
//!     │
//!     ├──> Language detection (from extension)
//!     │
//!     ├──> ParserRegistry lookup → MethodExtractor
//!     │    ├─> TreeSitterExtractor (per-language method node kinds)
//!     │    ├─> PythonExtractor (functions + class methods, docstrings)
//!     │    └─> HaskellExtractor (signature + equations as one method)
//!     │
//!     ├──> Doc comment prepended (docstring languages excluded)
//!     │
//!     └──> TextSplitter (recursive, language separator ladder)
//!          └─> Document { content, filename, method_name, commit_hash, start_line }
//! ```
//!
//! ## Example
//!
//! ```rust
//! use codequery_code_chunker::{DocumentParser, ParserConfig};
//!
//! let parser = DocumentParser::new(ParserConfig::default()).unwrap();
//!
//! let code = r#"
//! /// Trims and upper-cases the input.
//! fn process_data(input: &str) -> String {
//!     input.trim().to_uppercase()
//! }
//! "#;
//!
//! let documents = parser.parse_source(code, "src/example.rs", Some("9f1c2e")).unwrap();
//! assert_eq!(documents.len(), 1);
//! assert_eq!(documents[0].method_name(), Some("process_data"));
//! ```

mod ast_analyzer;
mod config;
mod error;
mod language;
mod parser;
mod registry;
mod splitter;
mod types;

pub use ast_analyzer::{HaskellExtractor, NodeKinds, PythonExtractor, TreeSitterExtractor};
pub use config::ParserConfig;
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use parser::DocumentParser;
pub use registry::{MethodExtractor, ParserRegistry};
pub use splitter::TextSplitter;
pub use types::{empty_as_none, Document, DocumentMetadata, MethodNode};

use crate::config::ParserConfig;
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::registry::ParserRegistry;
use crate::splitter::TextSplitter;
use crate::types::{Document, MethodNode};

/// Turns a source file into method-level documents
pub struct DocumentParser {
    config: ParserConfig,
    registry: ParserRegistry,
}

impl DocumentParser {
    /// Parser with the built-in extractor for every supported language
    pub fn new(config: ParserConfig) -> Result<Self> {
        Self::with_registry(config, ParserRegistry::with_defaults())
    }

    pub fn with_registry(config: ParserConfig, registry: ParserRegistry) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self { config, registry })
    }

    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn supports(&self, filename: &str) -> bool {
        self.registry.supports(Language::from_path(filename))
    }

    /// Parse `source` as the file `filename`.
    ///
    /// Every returned document carries `filename` and `commit_hash`. Files in
    /// an unknown language, and files without functions, yield no documents.
    pub fn parse_source(
        &self,
        source: &str,
        filename: &str,
        commit_hash: Option<&str>,
    ) -> Result<Vec<Document>> {
        let language = Language::from_path(filename);
        let Some(extractor) = self.registry.get(language) else {
            log::debug!("No extractor for {filename} ({language}), skipping");
            return Ok(Vec::new());
        };
        if source.trim().is_empty() {
            return Ok(Vec::new());
        }

        let methods = extractor.extract(source)?;
        let splitter = TextSplitter::for_language(language, &self.config);

        let mut documents = Vec::new();
        for method in &methods {
            let text = self.method_text(language, method);
            for piece in splitter.split(&text) {
                documents.push(
                    Document::new(
                        piece,
                        filename,
                        method.name.clone(),
                        commit_hash.map(str::to_string),
                    )
                    .with_start_line(method.start_line),
                );
            }
        }

        log::debug!(
            "Parsed {filename}: {} methods, {} documents",
            methods.len(),
            documents.len()
        );
        Ok(documents)
    }

    fn method_text(&self, language: Language, method: &MethodNode) -> String {
        match &method.doc_comment {
            Some(doc) if self.config.include_doc_comments && !language.doc_comment_inside_body() => {
                format!("{doc}\n{}", method.source)
            }
            _ => method.source.clone(),
        }
    }
}

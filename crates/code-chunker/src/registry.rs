use crate::ast_analyzer::{HaskellExtractor, PythonExtractor, TreeSitterExtractor};
use crate::error::Result;
use crate::language::Language;
use crate::types::MethodNode;
use std::collections::HashMap;

/// Finds function- and method-level units in one language's source.
pub trait MethodExtractor: Send + Sync {
    fn language(&self) -> Language;

    fn extract(&self, source: &str) -> Result<Vec<MethodNode>>;
}

/// Lookup table from language to its method extractor
pub struct ParserRegistry {
    extractors: HashMap<Language, Box<dyn MethodExtractor>>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with an extractor for every supported language
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for language in Language::SUPPORTED {
            if language == Language::Python {
                registry.register(Box::new(PythonExtractor));
            } else if language == Language::Haskell {
                registry.register(Box::new(HaskellExtractor));
            } else if let Some(extractor) = TreeSitterExtractor::for_language(language) {
                registry.register(Box::new(extractor));
            }
        }
        registry
    }

    /// Adds or replaces the extractor for its language
    pub fn register(&mut self, extractor: Box<dyn MethodExtractor>) {
        self.extractors.insert(extractor.language(), extractor);
    }

    pub fn get(&self, language: Language) -> Option<&dyn MethodExtractor> {
        self.extractors.get(&language).map(|e| e.as_ref())
    }

    pub fn supports(&self, language: Language) -> bool {
        self.extractors.contains_key(&language)
    }

    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<_> = self.extractors.keys().copied().collect();
        languages.sort_by_key(|l| l.as_str());
        languages
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

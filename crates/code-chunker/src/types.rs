use serde::{Deserialize, Serialize};

/// A parsed unit of source text, ready to be embedded.
///
/// One document corresponds to one function or method, or to one piece of a
/// long method after splitting. Many documents may share a filename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        filename: impl Into<String>,
        method_name: Option<String>,
        commit_hash: Option<String>,
    ) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                filename: filename.into(),
                method_name,
                commit_hash,
                start_line: None,
            },
        }
    }

    /// Record the 1-indexed line the source method starts on.
    #[must_use]
    pub fn with_start_line(mut self, line: usize) -> Self {
        self.metadata.start_line = Some(line);
        self
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.metadata.filename
    }

    #[must_use]
    pub fn commit_hash(&self) -> Option<&str> {
        self.metadata.commit_hash.as_deref()
    }

    #[must_use]
    pub fn method_name(&self) -> Option<&str> {
        self.metadata.method_name.as_deref()
    }

    #[must_use]
    pub fn start_line(&self) -> Option<usize> {
        self.metadata.start_line
    }

    /// Overwrite the provenance fields, keeping content and method name.
    pub fn retag(&mut self, filename: &str, commit_hash: Option<&str>) {
        if self.metadata.filename != filename {
            self.metadata.filename = filename.to_string();
        }
        self.metadata.commit_hash = commit_hash.map(str::to_string);
    }
}

/// Provenance of a document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Repository-relative path with `/` separators
    pub filename: String,

    /// Name of the function or method the content came from
    #[serde(default)]
    pub method_name: Option<String>,

    /// Last commit touching the file, `None` when git could not tell
    #[serde(default, deserialize_with = "empty_as_none")]
    pub commit_hash: Option<String>,

    /// First line of the method, 1-indexed
    #[serde(default)]
    pub start_line: Option<usize>,
}

/// Treats `""` the same as a missing hash.
pub fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|hash| !hash.is_empty()))
}

/// A function or method located in a syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNode {
    pub name: Option<String>,
    pub doc_comment: Option<String>,
    pub source: String,
    /// 1-indexed
    pub start_line: usize,
}

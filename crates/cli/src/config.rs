use anyhow::{Context, Result};
use clap::ValueEnum;
use codequery_code_chunker::ParserConfig;
use codequery_vector_store::{mmr, Embedder, HttpEmbedderConfig, StubEmbedder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const EMBEDDING_MODE_ENV: &str = "CODEQUERY_EMBEDDING_MODE";

/// Which embedder backs the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Deterministic hashing, no network
    #[default]
    Stub,
    /// OpenAI-compatible `/embeddings` endpoint
    Http,
}

impl EmbedMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Some(Self::Stub),
            "http" => Some(Self::Http),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub mode: EmbedMode,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Vector width; unset means the width of the mode's default model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    pub max_batch: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        let http = HttpEmbedderConfig::default();
        Self {
            mode: EmbedMode::default(),
            model: http.model,
            base_url: http.base_url,
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimension: None,
            max_batch: http.max_batch,
            timeout_secs: http.timeout.as_secs(),
        }
    }
}

impl EmbeddingsConfig {
    /// Configured width, else 384 for the stub and the default HTTP
    /// model's width for HTTP.
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or_else(|| match self.mode {
            EmbedMode::Stub => StubEmbedder::default().dimension(),
            EmbedMode::Http => HttpEmbedderConfig::default().dimension,
        })
    }

    /// Reads the API key from `api_key_env`. A missing key is an error.
    pub fn http_config(&self) -> Result<HttpEmbedderConfig> {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .with_context(|| {
                format!(
                    "HTTP embeddings need an API key in ${}",
                    self.api_key_env
                )
            })?;
        Ok(HttpEmbedderConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: Some(api_key),
            dimension: self.dimension(),
            max_batch: self.max_batch,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda: f32,
    /// Re-rank with maximal marginal relevance
    pub mmr: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k: mmr::DEFAULT_K,
            fetch_k: mmr::DEFAULT_FETCH_K,
            lambda: mmr::DEFAULT_LAMBDA,
            mmr: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where indexes and caches are kept
    pub state_dir: Option<PathBuf>,
    pub embeddings: EmbeddingsConfig,
    pub search: SearchConfig,
    pub parser: ParserConfig,
}

impl Config {
    /// `<config dir>/codequery/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("codequery").join(CONFIG_FILE_NAME))
    }

    /// Loads `path`, or the default location when `None`. A missing file
    /// yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_toml(&text)
                .with_context(|| format!("Invalid config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config
            .parser
            .validate()
            .map_err(|msg| anyhow::anyhow!("parser: {msg}"))?;
        if !(0.0..=1.0).contains(&config.search.lambda) {
            anyhow::bail!("search.lambda must be within [0, 1]");
        }
        Ok(config)
    }

    /// `CODEQUERY_EMBEDDING_MODE` wins over the file
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(EMBEDDING_MODE_ENV) {
            match EmbedMode::parse(&value) {
                Some(mode) => self.embeddings.mode = mode,
                None => log::warn!("Ignoring {EMBEDDING_MODE_ENV}={value:?}"),
            }
        }
    }
}

use crate::error::{Result, VectorStoreError};
use crate::types::VectorId;
use codequery_code_chunker::empty_as_none;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// What the index holds for one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub filename: String,
    /// Last commit touching the file when it was embedded
    #[serde(default, deserialize_with = "empty_as_none")]
    pub commit_hash: Option<String>,
    pub vector_ids: Vec<VectorId>,
}

impl CacheRecord {
    pub fn new(filename: impl Into<String>, commit_hash: Option<String>) -> Self {
        Self {
            filename: filename.into(),
            commit_hash,
            vector_ids: Vec::new(),
        }
    }

    /// Both hashes known and equal. An unknown hash never matches.
    pub fn matches_hash(&self, commit_hash: Option<&str>) -> bool {
        matches!(
            (self.commit_hash.as_deref(), commit_hash),
            (Some(recorded), Some(current)) if recorded == current
        )
    }
}

/// filename -> record
pub type VectorCache = BTreeMap<String, CacheRecord>;

/// Reads and writes `<name>.json` cache files in one directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub async fn exists(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.path_for(name))
            .await
            .unwrap_or(false)
    }

    pub async fn load(&self, name: &str) -> Result<VectorCache> {
        let path = self.path_for(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VectorStoreError::NotFound(format!(
                    "cache {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let cache: VectorCache = serde_json::from_slice(&bytes).map_err(|e| {
            VectorStoreError::CorruptData(format!("cache {}: {e}", path.display()))
        })?;
        validate(&cache)
            .map_err(|msg| VectorStoreError::CorruptData(format!("cache {}: {msg}", path.display())))?;

        log::debug!("Loaded cache {} ({} records)", path.display(), cache.len());
        Ok(cache)
    }

    /// Atomic replace: readers see the old file or the new one, never a mix.
    pub async fn save(&self, cache: &VectorCache, name: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(name);
        let bytes = serde_json::to_vec_pretty(cache)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn validate(cache: &VectorCache) -> std::result::Result<(), String> {
    let mut owners: HashMap<VectorId, &str> = HashMap::new();
    for (key, record) in cache {
        if key != &record.filename {
            return Err(format!(
                "key {key:?} holds record for {:?}",
                record.filename
            ));
        }
        for id in &record.vector_ids {
            if let Some(owner) = owners.insert(*id, key) {
                return Err(format!("vector {id} is claimed by {owner:?} and {key:?}"));
            }
        }
    }
    Ok(())
}

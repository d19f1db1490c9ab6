use crate::cache::CacheStore;
use crate::error::{Result, VectorStoreError};
use std::path::{Path, PathBuf};

pub const STATE_DIR_NAME: &str = "codequery";
pub const STATE_DIR_ENV: &str = "CODEQUERY_STATE_DIR";

/// `$CODEQUERY_STATE_DIR`, else the platform cache dir plus `codequery`.
pub fn default_state_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::cache_dir()
        .map(|dir| dir.join(STATE_DIR_NAME))
        .ok_or_else(|| VectorStoreError::Other("cannot determine a cache directory".to_string()))
}

/// Where the persisted index and cache of a named store live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    dir: PathBuf,
}

impl StateLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_env() -> Result<Self> {
        default_state_dir().map(Self::new)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.index.json"))
    }

    pub fn cache_store(&self) -> CacheStore {
        CacheStore::new(&self.dir)
    }
}

/// Store names become file names, so they must be a single plain component.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(VectorStoreError::Other(format!("invalid store name {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_share_the_state_dir() {
        let layout = StateLayout::new("/tmp/state");
        assert_eq!(
            layout.index_path("repo"),
            PathBuf::from("/tmp/state/repo.index.json")
        );
        assert_eq!(
            layout.cache_store().path_for("repo"),
            PathBuf::from("/tmp/state/repo.json")
        );
    }

    #[test]
    fn store_names_are_single_components() {
        assert!(validate_name("my-repo").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
    }
}

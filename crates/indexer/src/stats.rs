use serde::{Deserialize, Serialize};

/// What a build or sync did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Files seen for the first time
    pub files_added: usize,

    /// Files re-embedded because their commit hash changed
    pub files_updated: usize,

    pub files_unchanged: usize,

    /// Files dropped from the cache
    pub files_removed: usize,

    pub vectors_added: usize,

    pub vectors_deleted: usize,

    /// Files whose commit hash could not be determined
    pub hash_unavailable: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, vectors: usize) {
        self.files_added += 1;
        self.vectors_added += vectors;
    }

    pub fn update_file(&mut self, added: usize, deleted: usize) {
        self.files_updated += 1;
        self.vectors_added += added;
        self.vectors_deleted += deleted;
    }

    pub fn remove_file(&mut self, deleted: usize) {
        self.files_removed += 1;
        self.vectors_deleted += deleted;
    }

    pub fn is_noop(&self) -> bool {
        self.files_added == 0
            && self.files_updated == 0
            && self.files_removed == 0
            && self.vectors_added == 0
            && self.vectors_deleted == 0
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} updated, {} unchanged, {} removed (+{} / -{} vectors) in {} ms",
            self.files_added,
            self.files_updated,
            self.files_unchanged,
            self.files_removed,
            self.vectors_added,
            self.vectors_deleted,
            self.time_ms
        )
    }
}

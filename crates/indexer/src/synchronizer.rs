use crate::error::{IndexerError, Result};
use crate::git::CommitHashSource;
use crate::source::DocumentSource;
use crate::stats::SyncReport;
use codequery_code_chunker::Document;
use codequery_vector_store::{
    validate_name, CacheRecord, Embedder, FlatIndex, SearchHit, SimilarityIndex, StateLayout,
    VectorCache, VectorId, VectorStoreError,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// The services a [`Synchronizer`] calls out to
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn Embedder>,
    pub source: Arc<dyn DocumentSource>,
    pub hashes: Arc<dyn CommitHashSource>,
}

/// A broken link between the cache and the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// A record points at an id the index does not hold
    DanglingId { filename: String, id: VectorId },
    /// Two records claim the same id
    SharedId {
        id: VectorId,
        first: String,
        second: String,
    },
    /// The vector behind a record belongs to another file
    FilenameMismatch {
        filename: String,
        id: VectorId,
        actual: String,
    },
    /// The vector behind a record was embedded at another commit
    HashMismatch {
        filename: String,
        id: VectorId,
        recorded: Option<String>,
        actual: Option<String>,
    },
    /// A record without vectors
    EmptyRecord { filename: String },
    /// A live vector no record points at
    Orphan { id: VectorId, filename: String },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingId { filename, id } => {
                write!(f, "{filename}: vector {id} is missing from the index")
            }
            Self::SharedId { id, first, second } => {
                write!(f, "vector {id} is claimed by both {first} and {second}")
            }
            Self::FilenameMismatch {
                filename,
                id,
                actual,
            } => write!(f, "{filename}: vector {id} belongs to {actual}"),
            Self::HashMismatch {
                filename,
                id,
                recorded,
                actual,
            } => write!(
                f,
                "{filename}: vector {id} has commit {} but the record has {}",
                actual.as_deref().unwrap_or("<none>"),
                recorded.as_deref().unwrap_or("<none>")
            ),
            Self::EmptyRecord { filename } => write!(f, "{filename}: record has no vectors"),
            Self::Orphan { id, filename } => {
                write!(f, "vector {id} ({filename}) is not referenced by any record")
            }
        }
    }
}

/// Keeps a similarity index and its per-file cache in step with a
/// repository.
///
/// Every cached id is live in the index, its vector carries the record's
/// filename and commit hash, and no id is shared between records. `build`
/// and `sync` restore this before they persist.
pub struct Synchronizer {
    name: String,
    layout: StateLayout,
    index: Box<dyn SimilarityIndex>,
    cache: VectorCache,
    collaborators: Collaborators,
}

impl Synchronizer {
    /// Starts from `index` with an empty cache. Nothing is read from disk.
    pub fn new(
        name: impl Into<String>,
        layout: StateLayout,
        index: Box<dyn SimilarityIndex>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        check_dimensions(index.as_ref(), collaborators.embedder.as_ref())?;
        Ok(Self {
            name,
            layout,
            index,
            cache: VectorCache::new(),
            collaborators,
        })
    }

    /// Loads the persisted index and cache of `name`.
    pub async fn open(
        name: impl Into<String>,
        layout: StateLayout,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        let index = FlatIndex::load(layout.index_path(&name)).await?;
        let cache = layout.cache_store().load(&name).await?;
        check_dimensions(&index, collaborators.embedder.as_ref())?;

        log::info!(
            "Opened {name}: {} files, {} vectors",
            cache.len(),
            index.len()
        );
        Ok(Self {
            name,
            layout,
            index: Box::new(index),
            cache,
            collaborators,
        })
    }

    /// Opens persisted state, or builds it from `files` when there is none.
    pub async fn open_or_build(
        name: impl Into<String>,
        layout: StateLayout,
        collaborators: Collaborators,
        files: &[String],
    ) -> Result<Self> {
        let name = name.into();
        match Self::open(name.clone(), layout.clone(), collaborators.clone()).await {
            Ok(synchronizer) => Ok(synchronizer),
            Err(e) if e.is_not_found() => {
                log::info!("No persisted state for {name}, building from {} files", files.len());
                let dimension = collaborators.embedder.dimension();
                let mut synchronizer =
                    Self::new(name, layout, Box::new(FlatIndex::new(dimension)), collaborators)?;
                synchronizer.rebuild(files).await?;
                Ok(synchronizer)
            }
            Err(e) => Err(e),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn index(&self) -> &dyn SimilarityIndex {
        self.index.as_ref()
    }

    pub fn cache(&self) -> &VectorCache {
        &self.cache
    }

    /// Parses every file and runs [`Self::build`] on the result.
    pub async fn rebuild(&mut self, files: &[String]) -> Result<SyncReport> {
        let mut unavailable = 0;
        let mut documents = Vec::new();
        for filename in distinct(files) {
            let hash = self.resolve_hash(filename, &mut unavailable).await?;
            documents.extend(
                self.collaborators
                    .source
                    .parse_file(filename, hash.as_deref())
                    .await?,
            );
        }

        let mut report = self.build(documents).await?;
        report.hash_unavailable = unavailable;
        Ok(report)
    }

    /// Replaces the index and cache with exactly `documents`, then persists.
    pub async fn build(&mut self, mut documents: Vec<Document>) -> Result<SyncReport> {
        let started = Instant::now();
        log::info!("Building {} from {} documents", self.name, documents.len());

        self.index.clear();
        self.cache.clear();
        unify_commit_hashes(&mut documents);

        let ids = self.embed_and_add(documents).await?;
        for id in &ids {
            let document = self.index.get(*id).ok_or_else(|| {
                IndexerError::Other(format!("vector {id} vanished right after insertion"))
            })?;
            let filename = document.filename().to_string();
            let commit_hash = document.metadata.commit_hash.clone();
            self.cache
                .entry(filename.clone())
                .or_insert_with(|| CacheRecord::new(filename, commit_hash))
                .vector_ids
                .push(*id);
        }

        let mut report = SyncReport::new();
        report.files_added = self.cache.len();
        report.vectors_added = ids.len();

        self.persist().await?;
        report.time_ms = started.elapsed().as_millis() as u64;
        log::info!("Built {}: {report}", self.name);
        Ok(report)
    }

    /// Brings the index in line with the files currently in the repository.
    ///
    /// Only files whose commit hash differs from the cached one are parsed
    /// and embedded again. Cached files missing from `current_files` are
    /// dropped.
    pub async fn sync(&mut self, current_files: &[String]) -> Result<SyncReport> {
        let started = Instant::now();
        let files = distinct(current_files);
        log::info!("Syncing {} against {} files", self.name, files.len());

        let mut report = SyncReport::new();
        for filename in &files {
            let hash = self
                .resolve_hash(filename, &mut report.hash_unavailable)
                .await?;
            if self.is_unchanged(filename, hash.as_deref()) {
                report.files_unchanged += 1;
                continue;
            }
            let documents = self
                .collaborators
                .source
                .parse_file(filename, hash.as_deref())
                .await?;
            self.apply_file(filename, hash, documents, &mut report)
                .await?;
        }

        let current: HashSet<&str> = files.into_iter().collect();
        self.remove_stale(&current, &mut report)?;

        self.persist().await?;
        report.time_ms = started.elapsed().as_millis() as u64;
        log::info!("Synced {}: {report}", self.name);
        Ok(report)
    }

    /// [`Self::sync`] for already parsed documents.
    ///
    /// Documents are grouped by filename; a group's commit hash is the one
    /// of its first document. Cached files without a group are dropped.
    pub async fn sync_documents(&mut self, documents: Vec<Document>) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::new();

        let mut groups: Vec<(String, Option<String>, Vec<Document>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for document in documents {
            match positions.get(document.filename()) {
                Some(&position) => groups[position].2.push(document),
                None => {
                    positions.insert(document.filename().to_string(), groups.len());
                    groups.push((
                        document.filename().to_string(),
                        document.metadata.commit_hash.clone(),
                        vec![document],
                    ));
                }
            }
        }

        let current: HashSet<String> = positions.into_keys().collect();
        for (filename, hash, documents) in groups {
            if hash.is_none() {
                log::warn!("Documents for {filename} carry no commit hash; treating it as changed");
                report.hash_unavailable += 1;
            }
            if self.is_unchanged(&filename, hash.as_deref()) {
                report.files_unchanged += 1;
                continue;
            }
            self.apply_file(&filename, hash, documents, &mut report)
                .await?;
        }

        let current: HashSet<&str> = current.iter().map(String::as_str).collect();
        self.remove_stale(&current, &mut report)?;

        self.persist().await?;
        report.time_ms = started.elapsed().as_millis() as u64;
        log::info!("Synced {} from documents: {report}", self.name);
        Ok(report)
    }

    /// Up to `k` documents closest to `query`, best first
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let vector = self.collaborators.embedder.embed(query).await?;
        Ok(self.index.search(&vector, k)?)
    }

    /// `k` relevant but mutually diverse documents out of the `fetch_k` closest
    pub async fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<SearchHit>> {
        let vector = self.collaborators.embedder.embed(query).await?;
        Ok(self
            .index
            .max_marginal_relevance_search(&vector, k, fetch_k, lambda)?)
    }

    /// Audits the cache against the index. Empty when they agree.
    pub fn check_invariants(&self) -> Vec<Inconsistency> {
        let mut problems = Vec::new();
        let mut owners: HashMap<VectorId, &str> = HashMap::new();

        for (filename, record) in &self.cache {
            if record.vector_ids.is_empty() {
                problems.push(Inconsistency::EmptyRecord {
                    filename: filename.clone(),
                });
            }
            for &id in &record.vector_ids {
                if let Some(first) = owners.insert(id, filename) {
                    problems.push(Inconsistency::SharedId {
                        id,
                        first: first.to_string(),
                        second: filename.clone(),
                    });
                }
                let Some(document) = self.index.get(id) else {
                    problems.push(Inconsistency::DanglingId {
                        filename: filename.clone(),
                        id,
                    });
                    continue;
                };
                if document.filename() != filename {
                    problems.push(Inconsistency::FilenameMismatch {
                        filename: filename.clone(),
                        id,
                        actual: document.filename().to_string(),
                    });
                }
                if document.metadata.commit_hash != record.commit_hash {
                    problems.push(Inconsistency::HashMismatch {
                        filename: filename.clone(),
                        id,
                        recorded: record.commit_hash.clone(),
                        actual: document.metadata.commit_hash.clone(),
                    });
                }
            }
        }

        for id in self.index.ids() {
            if !owners.contains_key(&id) {
                let filename = self
                    .index
                    .get(id)
                    .map(|d| d.filename().to_string())
                    .unwrap_or_default();
                problems.push(Inconsistency::Orphan { id, filename });
            }
        }

        problems
    }

    /// Writes the index, then the cache.
    pub async fn persist(&self) -> Result<()> {
        self.index
            .persist(&self.layout.index_path(&self.name))
            .await?;
        self.layout
            .cache_store()
            .save(&self.cache, &self.name)
            .await?;
        Ok(())
    }

    async fn resolve_hash(&self, filename: &str, unavailable: &mut usize) -> Result<Option<String>> {
        match self.collaborators.hashes.commit_hash(filename).await {
            Ok(hash) => Ok(Some(hash)),
            Err(IndexerError::CommitHashUnavailable { reason, .. }) => {
                log::warn!("No commit hash for {filename} ({reason}); treating it as changed");
                *unavailable += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn is_unchanged(&self, filename: &str, hash: Option<&str>) -> bool {
        self.cache
            .get(filename)
            .is_some_and(|record| record.matches_hash(hash))
    }

    /// Replaces whatever the index holds for `filename` with `documents`.
    ///
    /// New vectors are added before the old ones are deleted, so the new ids
    /// never collide with the old ones even when the index recycles ids.
    async fn apply_file(
        &mut self,
        filename: &str,
        hash: Option<String>,
        mut documents: Vec<Document>,
        report: &mut SyncReport,
    ) -> Result<()> {
        for document in &mut documents {
            document.retag(filename, hash.as_deref());
        }
        let new_ids = self.embed_and_add(documents).await?;

        let mut record = CacheRecord::new(filename, hash);
        record.vector_ids = new_ids;
        let added = record.vector_ids.len();

        match self.cache.remove(filename) {
            Some(old) => {
                let deleted = self.index.delete(&old.vector_ids)?;
                log::debug!("Updated {filename}: +{added} / -{deleted} vectors");
                report.update_file(added, deleted);
            }
            None if added > 0 => {
                log::debug!("Added {filename}: {added} vectors");
                report.add_file(added);
            }
            None => {
                log::debug!("Skipping {filename}: no documents");
                return Ok(());
            }
        }

        if added > 0 {
            self.cache.insert(filename.to_string(), record);
        } else {
            log::debug!("{filename} no longer has documents, dropping its record");
        }
        Ok(())
    }

    fn remove_stale(&mut self, current: &HashSet<&str>, report: &mut SyncReport) -> Result<()> {
        let stale: Vec<String> = self
            .cache
            .keys()
            .filter(|filename| !current.contains(filename.as_str()))
            .cloned()
            .collect();

        for filename in stale {
            if let Some(record) = self.cache.remove(&filename) {
                let deleted = self.index.delete(&record.vector_ids)?;
                log::debug!("Removed {filename}: -{deleted} vectors");
                report.remove_file(deleted);
            }
        }
        Ok(())
    }

    async fn embed_and_add(&mut self, documents: Vec<Document>) -> Result<Vec<VectorId>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let vectors = self.collaborators.embedder.embed_batch(texts).await?;
        if vectors.len() != documents.len() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                documents.len()
            ))
            .into());
        }

        Ok(self
            .index
            .add_documents(documents.into_iter().zip(vectors).collect())?)
    }
}

fn check_dimensions(index: &dyn SimilarityIndex, embedder: &dyn Embedder) -> Result<()> {
    if index.dimension() != embedder.dimension() {
        return Err(VectorStoreError::InvalidDimension {
            expected: index.dimension(),
            actual: embedder.dimension(),
        }
        .into());
    }
    Ok(())
}

/// Input order, duplicates dropped
fn distinct(files: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    files
        .iter()
        .map(String::as_str)
        .filter(|filename| seen.insert(*filename))
        .collect()
}

/// The first commit hash seen for a filename wins; later documents of the
/// same file are re-tagged with it.
fn unify_commit_hashes(documents: &mut [Document]) {
    let mut first_seen: HashMap<String, Option<String>> = HashMap::new();
    for document in documents {
        let filename = document.filename().to_string();
        let hash = first_seen
            .entry(filename.clone())
            .or_insert_with(|| document.metadata.commit_hash.clone());
        if *hash != document.metadata.commit_hash {
            log::warn!(
                "{filename}: document commit {:?} conflicts with {:?}, keeping the first",
                document.metadata.commit_hash,
                hash
            );
            document.metadata.commit_hash = hash.clone();
        }
    }
}

use crate::embeddings::cosine_similarity;
use crate::error::{Result, VectorStoreError};
use crate::mmr::maximal_marginal_relevance;
use crate::types::{SearchHit, VectorId};
use async_trait::async_trait;
use codequery_code_chunker::Document;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const FLAT_INDEX_SCHEMA_VERSION: u32 = 1;

/// A vector index keyed by ids it assigns itself.
///
/// `add_documents` returns one fresh id per item in insertion order.
/// `delete` invalidates exactly the given ids. Ids are meaningful only to the
/// index that issued them.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All-or-nothing: on error no item was inserted.
    fn add_documents(&mut self, items: Vec<(Document, Vec<f32>)>) -> Result<Vec<VectorId>>;

    /// Returns how many ids were live and are now removed.
    fn delete(&mut self, ids: &[VectorId]) -> Result<usize>;

    fn get(&self, id: VectorId) -> Option<&Document>;

    fn vector(&self, id: VectorId) -> Option<&[f32]>;

    /// Live ids in ascending order
    fn ids(&self) -> Vec<VectorId>;

    /// Up to `k` hits by descending cosine similarity, ties by ascending id
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    fn max_marginal_relevance_search(
        &self,
        query: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<SearchHit>> {
        let candidates = self.search(query, fetch_k.max(k))?;
        let vectors = candidates
            .iter()
            .map(|hit| self.vector(hit.id))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| VectorStoreError::Other("search hit without a vector".to_string()))?;

        Ok(maximal_marginal_relevance(query, &vectors, k, lambda)
            .into_iter()
            .map(|i| candidates[i].clone())
            .collect())
    }

    fn clear(&mut self);

    async fn persist(&self, path: &Path) -> Result<()>;
}

/// How a [`FlatIndex`] hands out ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// Ids only ever grow; deleted ids are never issued again
    #[default]
    Monotonic,
    /// The smallest freed id is issued before any new one
    ReuseFreed,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    document: Document,
    vector: Vec<f32>,
}

/// Exact brute-force cosine index
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    id_policy: IdPolicy,
    next_id: u64,
    free_ids: BTreeSet<u64>,
    entries: BTreeMap<VectorId, IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    id: VectorId,
    document: Document,
    vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFlatIndex {
    schema_version: u32,
    dimension: usize,
    id_policy: IdPolicy,
    next_id: u64,
    free_ids: Vec<u64>,
    entries: Vec<PersistedEntry>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self::with_policy(dimension, IdPolicy::default())
    }

    pub fn with_policy(dimension: usize, id_policy: IdPolicy) -> Self {
        Self {
            dimension,
            id_policy,
            next_id: 0,
            free_ids: BTreeSet::new(),
            entries: BTreeMap::new(),
        }
    }

    pub const fn id_policy(&self) -> IdPolicy {
        self.id_policy
    }

    fn allocate_id(&mut self) -> Result<VectorId> {
        if self.id_policy == IdPolicy::ReuseFreed {
            if let Some(id) = self.free_ids.pop_first() {
                return Ok(VectorId(id));
            }
        }
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| VectorStoreError::IndexMutation("vector id space exhausted".to_string()))?;
        Ok(VectorId(id))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VectorStoreError::NotFound(format!(
                    "index {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let persisted: PersistedFlatIndex = serde_json::from_slice(&bytes).map_err(|e| {
            VectorStoreError::CorruptData(format!("index {}: {e}", path.display()))
        })?;
        Self::from_persisted(persisted)
            .map_err(|msg| VectorStoreError::CorruptData(format!("index {}: {msg}", path.display())))
    }

    fn from_persisted(persisted: PersistedFlatIndex) -> std::result::Result<Self, String> {
        if persisted.schema_version != FLAT_INDEX_SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema_version {} (expected {FLAT_INDEX_SCHEMA_VERSION})",
                persisted.schema_version
            ));
        }

        let mut entries = BTreeMap::new();
        for entry in persisted.entries {
            if entry.vector.len() != persisted.dimension {
                return Err(format!(
                    "vector {} has dimension {}, index declares {}",
                    entry.id,
                    entry.vector.len(),
                    persisted.dimension
                ));
            }
            if entry.id.0 >= persisted.next_id {
                return Err(format!("vector {} is beyond next_id {}", entry.id, persisted.next_id));
            }
            let previous = entries.insert(
                entry.id,
                IndexEntry {
                    document: entry.document,
                    vector: entry.vector,
                },
            );
            if previous.is_some() {
                return Err(format!("vector {} appears twice", entry.id));
            }
        }

        let free_ids: BTreeSet<u64> = persisted.free_ids.into_iter().collect();
        if let Some(id) = free_ids.iter().find(|id| entries.contains_key(&VectorId(**id))) {
            return Err(format!("vector {id} is both live and free"));
        }

        Ok(Self {
            dimension: persisted.dimension,
            id_policy: persisted.id_policy,
            next_id: persisted.next_id,
            free_ids,
            entries,
        })
    }

    fn to_persisted(&self) -> PersistedFlatIndex {
        PersistedFlatIndex {
            schema_version: FLAT_INDEX_SCHEMA_VERSION,
            dimension: self.dimension,
            id_policy: self.id_policy,
            next_id: self.next_id,
            free_ids: self.free_ids.iter().copied().collect(),
            entries: self
                .entries
                .iter()
                .map(|(id, entry)| PersistedEntry {
                    id: *id,
                    document: entry.document.clone(),
                    vector: entry.vector.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl SimilarityIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn add_documents(&mut self, items: Vec<(Document, Vec<f32>)>) -> Result<Vec<VectorId>> {
        for (position, (_, vector)) in items.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(VectorStoreError::IndexMutation(format!(
                    "item {position} has dimension {}, index expects {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }
        if self.id_policy == IdPolicy::Monotonic
            && self.next_id.checked_add(items.len() as u64).is_none()
        {
            return Err(VectorStoreError::IndexMutation(
                "vector id space exhausted".to_string(),
            ));
        }

        let mut ids = Vec::with_capacity(items.len());
        for (document, vector) in items {
            let id = self.allocate_id()?;
            self.entries.insert(id, IndexEntry { document, vector });
            ids.push(id);
        }
        Ok(ids)
    }

    fn delete(&mut self, ids: &[VectorId]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.entries.remove(id).is_some() {
                removed += 1;
                if self.id_policy == IdPolicy::ReuseFreed {
                    self.free_ids.insert(id.0);
                }
            } else {
                log::warn!("Ignoring delete of unknown vector id {id}");
            }
        }
        Ok(removed)
    }

    fn get(&self, id: VectorId) -> Option<&Document> {
        self.entries.get(&id).map(|entry| &entry.document)
    }

    fn vector(&self, id: VectorId) -> Option<&[f32]> {
        self.entries.get(&id).map(|entry| entry.vector.as_slice())
    }

    fn ids(&self) -> Vec<VectorId> {
        self.entries.keys().copied().collect()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.check_dimension(query)?;

        let mut scores: Vec<(VectorId, f32)> = self
            .entries
            .iter()
            .map(|(id, entry)| (*id, cosine_similarity(query, &entry.vector)))
            .collect();

        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores.truncate(k);

        Ok(scores
            .into_iter()
            .filter_map(|(id, score)| {
                self.entries.get(&id).map(|entry| SearchHit {
                    id,
                    document: entry.document.clone(),
                    score,
                })
            })
            .collect())
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.free_ids.clear();
        self.next_id = 0;
    }

    async fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(&self.to_persisted())?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

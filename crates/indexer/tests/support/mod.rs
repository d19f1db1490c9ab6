#![allow(dead_code)]

use async_trait::async_trait;
use codequery_code_chunker::Document;
use codequery_indexer::{
    Collaborators, CommitHashSource, DocumentSource, IndexerError, Result, Synchronizer,
};
use codequery_vector_store::{
    Embedder, FlatIndex, IdPolicy, StateLayout, StubEmbedder, VectorId, VectorStoreError,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const DIM: usize = 32;
pub const STORE: &str = "repo";

#[derive(Clone)]
struct FakeFile {
    hash: Option<String>,
    bodies: Vec<String>,
}

/// An in-memory repository: every file has a commit hash (or none) and a
/// list of method bodies.
#[derive(Default)]
pub struct FakeRepo {
    files: Mutex<BTreeMap<String, FakeFile>>,
    parsed: Mutex<Vec<String>>,
}

impl FakeRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, filename: &str, hash: Option<&str>, bodies: &[&str]) {
        self.files.lock().unwrap().insert(
            filename.to_string(),
            FakeFile {
                hash: hash.map(str::to_string),
                bodies: bodies.iter().map(|b| b.to_string()).collect(),
            },
        );
    }

    pub fn remove(&self, filename: &str) {
        self.files.lock().unwrap().remove(filename);
    }

    pub fn filenames(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    /// Every `parse_file` call so far, in order
    pub fn parsed(&self) -> Vec<String> {
        self.parsed.lock().unwrap().clone()
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            embedder: Arc::new(StubEmbedder::new(DIM)),
            source: self.clone(),
            hashes: self.clone(),
        }
    }
}

#[async_trait]
impl DocumentSource for FakeRepo {
    async fn parse_file(&self, filename: &str, commit_hash: Option<&str>) -> Result<Vec<Document>> {
        self.parsed.lock().unwrap().push(filename.to_string());
        let file = self
            .files
            .lock()
            .unwrap()
            .get(filename)
            .cloned()
            .ok_or_else(|| IndexerError::InvalidPath(filename.to_string()))?;
        Ok(file
            .bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                Document::new(
                    body.clone(),
                    filename,
                    Some(format!("method_{i}")),
                    commit_hash.map(str::to_string),
                )
            })
            .collect())
    }
}

#[async_trait]
impl CommitHashSource for FakeRepo {
    async fn commit_hash(&self, filename: &str) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(filename)
            .and_then(|file| file.hash.clone())
            .ok_or_else(|| IndexerError::hash_unavailable(filename, "not committed"))
    }
}

/// Embeds like the stub, except texts containing `BROKEN` come back one
/// component short.
pub struct BrokenEmbedder(pub StubEmbedder);

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn model_id(&self) -> &str {
        "broken"
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    async fn embed_batch(&self, texts: Vec<&str>) -> codequery_vector_store::Result<Vec<Vec<f32>>> {
        let broken: Vec<bool> = texts.iter().map(|t| t.contains("BROKEN")).collect();
        let mut vectors = self.0.embed_batch(texts).await?;
        for (vector, broken) in vectors.iter_mut().zip(broken) {
            if broken {
                vector.pop();
            }
        }
        Ok(vectors)
    }
}

pub fn synchronizer(repo: &Arc<FakeRepo>, state: &Path, policy: IdPolicy) -> Synchronizer {
    Synchronizer::new(
        STORE,
        StateLayout::new(state),
        Box::new(FlatIndex::with_policy(DIM, policy)),
        repo.collaborators(),
    )
    .expect("synchronizer")
}

pub fn doc(content: &str, filename: &str, hash: &str) -> Document {
    Document::new(content, filename, None, Some(hash.to_string()))
}

pub fn ids_of(sync: &Synchronizer, filename: &str) -> Vec<VectorId> {
    sync.cache()
        .get(filename)
        .map(|record| record.vector_ids.clone())
        .unwrap_or_default()
}

pub fn assert_consistent(sync: &Synchronizer) {
    let problems = sync.check_invariants();
    assert!(problems.is_empty(), "inconsistent state: {problems:?}");
}

pub fn is_corrupt(err: &IndexerError) -> bool {
    matches!(
        err,
        IndexerError::VectorStoreError(VectorStoreError::CorruptData(_))
    )
}

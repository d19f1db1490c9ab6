mod support;

use codequery_indexer::{Collaborators, IndexerError, Synchronizer};
use codequery_vector_store::{IdPolicy, StateLayout, StubEmbedder, VectorStoreError};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use support::*;
use tempfile::TempDir;

fn populate(repo: &FakeRepo) {
    repo.put("lib/parse.rs", Some("c1"), &["fn parse() {}", "fn parse_all() {}"]);
    repo.put("lib/render.rs", Some("c1"), &["fn render() {}"]);
}

#[tokio::test]
async fn open_restores_what_sync_persisted() {
    let tmp = TempDir::new().expect("tempdir");
    let repo = FakeRepo::new();
    populate(&repo);

    let mut sync = synchronizer(&repo, tmp.path(), IdPolicy::ReuseFreed);
    sync.sync(&repo.filenames()).await.expect("sync");
    let expected_hits = sync.similarity_search("fn render() {}", 3).await.expect("search");

    let reopened = Synchronizer::open(STORE, StateLayout::new(tmp.path()), repo.collaborators())
        .await
        .expect("open");

    assert_eq!(reopened.cache(), sync.cache());
    assert_eq!(reopened.index().ids(), sync.index().ids());
    assert_eq!(
        reopened.similarity_search("fn render() {}", 3).await.expect("search"),
        expected_hits
    );
    assert_consistent(&reopened);
}

#[tokio::test]
async fn reopened_state_syncs_incrementally() {
    let tmp = TempDir::new().expect("tempdir");
    let repo = FakeRepo::new();
    populate(&repo);
    synchronizer(&repo, tmp.path(), IdPolicy::Monotonic)
        .sync(&repo.filenames())
        .await
        .expect("sync");

    let mut reopened =
        Synchronizer::open(STORE, StateLayout::new(tmp.path()), repo.collaborators())
            .await
            .expect("open");
    repo.put("lib/render.rs", Some("c2"), &["fn render() { draw() }"]);
    let report = reopened.sync(&repo.filenames()).await.expect("sync");

    assert_eq!(report.files_unchanged, 1);
    assert_eq!(report.files_updated, 1);
    // monotonic ids keep counting after a reload
    assert!(reopened
        .cache()["lib/render.rs"]
        .vector_ids
        .iter()
        .all(|id| id.0 >= 3));
    assert_consistent(&reopened);
}

#[tokio::test]
async fn open_without_state_is_not_found() {
    let tmp = TempDir::new().expect("tempdir");
    let repo = FakeRepo::new();

    let err = Synchronizer::open(STORE, StateLayout::new(tmp.path()), repo.collaborators())
        .await
        .err()
        .expect("nothing persisted");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn open_or_build_builds_once() {
    let tmp = TempDir::new().expect("tempdir");
    let repo = FakeRepo::new();
    populate(&repo);
    let files = repo.filenames();

    let built = Synchronizer::open_or_build(
        STORE,
        StateLayout::new(tmp.path()),
        repo.collaborators(),
        &files,
    )
    .await
    .expect("first run builds");
    assert_eq!(built.cache().len(), 2);
    assert_eq!(built.index().len(), 3);
    assert_eq!(repo.parsed().len(), 2);

    let opened = Synchronizer::open_or_build(
        STORE,
        StateLayout::new(tmp.path()),
        repo.collaborators(),
        &files,
    )
    .await
    .expect("second run opens");
    assert_eq!(opened.cache(), built.cache());
    assert_eq!(repo.parsed().len(), 2);
}

#[tokio::test]
async fn garbage_cache_is_corrupt() {
    let tmp = TempDir::new().expect("tempdir");
    let repo = FakeRepo::new();
    populate(&repo);
    let mut sync = synchronizer(&repo, tmp.path(), IdPolicy::Monotonic);
    sync.sync(&repo.filenames()).await.expect("sync");

    let cache_path = sync.layout().cache_store().path_for(STORE);
    std::fs::write(&cache_path, b"{ not json").expect("clobber cache");

    let err = Synchronizer::open(STORE, StateLayout::new(tmp.path()), repo.collaborators())
        .await
        .err()
        .expect("corrupt cache");
    assert!(is_corrupt(&err), "{err}");

    let err = Synchronizer::open_or_build(
        STORE,
        StateLayout::new(tmp.path()),
        repo.collaborators(),
        &repo.filenames(),
    )
    .await
    .err()
    .expect("corruption is not rebuilt silently");
    assert!(is_corrupt(&err), "{err}");
}

#[tokio::test]
async fn cache_sharing_a_vector_between_files_is_corrupt() {
    let tmp = TempDir::new().expect("tempdir");
    let repo = FakeRepo::new();
    populate(&repo);
    let mut sync = synchronizer(&repo, tmp.path(), IdPolicy::Monotonic);
    sync.sync(&repo.filenames()).await.expect("sync");

    let cache_path = sync.layout().cache_store().path_for(STORE);
    std::fs::write(
        &cache_path,
        r#"{
            "a.rs": {"filename": "a.rs", "commit_hash": "c1", "vector_ids": [0, 1]},
            "b.rs": {"filename": "b.rs", "commit_hash": "", "vector_ids": [1]}
        }"#,
    )
    .expect("clobber cache");

    let err = Synchronizer::open(STORE, StateLayout::new(tmp.path()), repo.collaborators())
        .await
        .err()
        .expect("shared id");
    assert!(is_corrupt(&err), "{err}");
}

#[tokio::test]
async fn embedder_dimension_must_match_the_persisted_index() {
    let tmp = TempDir::new().expect("tempdir");
    let repo = FakeRepo::new();
    populate(&repo);
    synchronizer(&repo, tmp.path(), IdPolicy::Monotonic)
        .sync(&repo.filenames())
        .await
        .expect("sync");

    let collaborators = Collaborators {
        embedder: Arc::new(StubEmbedder::new(DIM * 2)),
        ..repo.collaborators()
    };
    let err = Synchronizer::open(STORE, StateLayout::new(tmp.path()), collaborators)
        .await
        .err()
        .expect("dimension mismatch");
    assert!(matches!(
        err,
        IndexerError::VectorStoreError(VectorStoreError::InvalidDimension {
            expected: DIM,
            actual
        }) if actual == DIM * 2
    ));
}

#[tokio::test]
async fn state_files_live_in_the_layout_dir() {
    let tmp = TempDir::new().expect("tempdir");
    let repo = FakeRepo::new();
    populate(&repo);
    synchronizer(&repo, tmp.path(), IdPolicy::Monotonic)
        .sync(&repo.filenames())
        .await
        .expect("sync");

    let mut names: Vec<String> = std::fs::read_dir(tmp.path())
        .expect("read state dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["repo.index.json", "repo.json"]);

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(tmp.path().join("repo.json")).expect("cache"))
            .expect("cache json");
    assert_eq!(raw["lib/render.rs"]["commit_hash"], "c1");
    assert_eq!(raw["lib/render.rs"]["vector_ids"].as_array().map(Vec::len), Some(1));
}

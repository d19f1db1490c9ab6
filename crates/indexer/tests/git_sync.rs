use codequery_code_chunker::ParserConfig;
use codequery_indexer::{
    Collaborators, FileScanner, GitRepository, RepositorySource, Synchronizer,
};
use codequery_vector_store::{StateLayout, StubEmbedder};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::Command;

async fn git(repo: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await
        .expect("git command");
    assert!(out.status.success(), "git {:?} failed", args);
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

async fn write(repo: &Path, filename: &str, contents: &str) {
    let path = repo.join(filename);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.expect("mkdir");
    }
    tokio::fs::write(path, contents).await.expect("write file");
}

fn collaborators(git: &GitRepository) -> Collaborators {
    Collaborators {
        embedder: Arc::new(StubEmbedder::new(64)),
        source: Arc::new(
            RepositorySource::new(git.root(), ParserConfig::default()).expect("source"),
        ),
        hashes: Arc::new(git.clone()),
    }
}

#[tokio::test]
async fn working_tree_changes_flow_into_the_index() {
    let repo_dir = TempDir::new().expect("repo dir");
    let state_dir = TempDir::new().expect("state dir");
    let repo = repo_dir.path();

    git(repo, &["init"]).await;
    git(repo, &["config", "user.email", "test@example.com"]).await;
    git(repo, &["config", "user.name", "Test"]).await;
    git(repo, &["config", "commit.gpgsign", "false"]).await;

    write(
        repo,
        "app/models.py",
        "class User:\n    def greet(self):\n        \"\"\"Say hello.\"\"\"\n        return 'hi'\n\n    def leave(self):\n        return 'bye'\n",
    )
    .await;
    write(repo, "app/util.py", "def slugify(text):\n    return text.lower()\n").await;
    write(repo, "src/main.rs", "/// Entry point\nfn main() {\n    run();\n}\n\nfn run() {}\n").await;
    write(repo, "README.md", "# demo\n").await;
    git(repo, &["add", "."]).await;
    git(repo, &["commit", "-m", "initial"]).await;

    let git_repo = GitRepository::discover(repo).await.expect("discover");
    let files = FileScanner::new(git_repo.root()).scan();
    assert_eq!(files, vec!["app/models.py", "app/util.py", "src/main.rs"]);

    let mut sync = Synchronizer::open_or_build(
        git_repo.name(),
        StateLayout::new(state_dir.path()),
        collaborators(&git_repo),
        &files,
    )
    .await
    .expect("build");
    assert_eq!(sync.cache().len(), 3);
    assert_eq!(sync.index().len(), 5);
    let head = git(repo, &["rev-parse", "HEAD"]).await;
    assert!(sync
        .cache()
        .values()
        .all(|record| record.commit_hash.as_deref() == Some(head.as_str())));
    assert!(sync.check_invariants().is_empty());

    let untouched = sync.cache()["app/models.py"].clone();
    write(repo, "app/util.py", "def slugify(text):\n    return text.strip().lower()\n\ndef title(text):\n    return text.title()\n").await;
    git(repo, &["rm", "-q", "src/main.rs"]).await;
    git(repo, &["commit", "-qam", "rework util, drop main"]).await;
    write(repo, "app/scratch.py", "def draft():\n    pass\n").await;

    let files = FileScanner::new(git_repo.root()).scan();
    let report = sync.sync(&files).await.expect("sync");

    assert_eq!(report.files_unchanged, 1);
    assert_eq!(report.files_updated, 1);
    assert_eq!(report.files_added, 1);
    assert_eq!(report.files_removed, 1);
    assert_eq!(report.hash_unavailable, 1);
    assert_eq!(sync.cache()["app/models.py"], untouched);
    assert_eq!(sync.cache()["app/util.py"].vector_ids.len(), 2);
    assert_eq!(sync.cache()["app/scratch.py"].commit_hash, None);
    assert!(!sync.cache().contains_key("src/main.rs"));
    assert!(sync.check_invariants().is_empty());

    let hits = sync
        .similarity_search("def title(text):\n    return text.title()", 1)
        .await
        .expect("search");
    assert_eq!(hits[0].document.filename(), "app/util.py");
    assert_eq!(hits[0].document.method_name(), Some("title"));
}

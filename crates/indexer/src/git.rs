use crate::error::{IndexerError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;

const GIT_LOG_TIMEOUT: Duration = Duration::from_millis(5_000);
const GIT_ROOT_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Reports the last commit that touched a file
#[async_trait]
pub trait CommitHashSource: Send + Sync {
    /// `filename` is relative to the repository root.
    async fn commit_hash(&self, filename: &str) -> Result<String>;
}

/// A git working tree driven through the `git` binary
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    /// Trusts `root` to be the top of a working tree.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Finds the working tree containing `path`.
    pub async fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let output = timeout(
            GIT_ROOT_TIMEOUT,
            tokio::process::Command::new("git")
                .arg("-C")
                .arg(path)
                .arg("rev-parse")
                .arg("--show-toplevel")
                .output(),
        )
        .await
        .map_err(|_| IndexerError::InvalidPath(format!("{}: git timed out", path.display())))??;

        if !output.status.success() {
            return Err(IndexerError::InvalidPath(format!(
                "{} is not inside a git repository",
                path.display()
            )));
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            return Err(IndexerError::InvalidPath(format!(
                "{}: git reported no top level",
                path.display()
            )));
        }
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Repository identifier: the root directory name.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "root".to_string())
    }
}

#[async_trait]
impl CommitHashSource for GitRepository {
    async fn commit_hash(&self, filename: &str) -> Result<String> {
        let output = timeout(
            GIT_LOG_TIMEOUT,
            tokio::process::Command::new("git")
                .arg("-C")
                .arg(&self.root)
                .arg("log")
                .arg("-n")
                .arg("1")
                .arg("--pretty=format:%H")
                .arg("--")
                .arg(filename)
                .output(),
        )
        .await
        .map_err(|_| IndexerError::hash_unavailable(filename, "git log timed out"))?
        .map_err(|e| IndexerError::hash_unavailable(filename, format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IndexerError::hash_unavailable(filename, stderr.trim()));
        }

        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if hash.is_empty() {
            return Err(IndexerError::hash_unavailable(filename, "file has no commits"));
        }
        Ok(hash)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::process::Command;

    pub(crate) async fn git_ok(repo: &Path, args: &[&str]) -> String {
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

    pub(crate) async fn init_repo(repo: &Path) {
        git_ok(repo, &["init"]).await;
        git_ok(repo, &["config", "user.email", "test@example.com"]).await;
        git_ok(repo, &["config", "user.name", "Test"]).await;
        git_ok(repo, &["config", "commit.gpgsign", "false"]).await;
    }

    #[tokio::test]
    async fn commit_hash_tracks_the_last_commit_per_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let repo = dir.path();
        init_repo(repo).await;

        tokio::fs::write(repo.join("a.py"), "def a():\n    pass\n")
            .await
            .expect("write a");
        tokio::fs::write(repo.join("b.py"), "def b():\n    pass\n")
            .await
            .expect("write b");
        git_ok(repo, &["add", "."]).await;
        git_ok(repo, &["commit", "-m", "c1"]).await;
        let c1 = git_ok(repo, &["rev-parse", "HEAD"]).await;

        tokio::fs::write(repo.join("a.py"), "def a():\n    return 1\n")
            .await
            .expect("write a2");
        git_ok(repo, &["commit", "-am", "c2"]).await;
        let c2 = git_ok(repo, &["rev-parse", "HEAD"]).await;

        let git = GitRepository::new(repo);
        assert_eq!(git.commit_hash("a.py").await.expect("hash a"), c2);
        assert_eq!(git.commit_hash("b.py").await.expect("hash b"), c1);

        tokio::fs::write(repo.join("new.py"), "x = 1\n")
            .await
            .expect("write new");
        let err = git.commit_hash("new.py").await.unwrap_err();
        assert!(matches!(err, IndexerError::CommitHashUnavailable { .. }));
    }

    #[tokio::test]
    async fn discover_finds_the_top_level() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let repo = dir.path().join("my-project");
        tokio::fs::create_dir_all(repo.join("src/deep"))
            .await
            .expect("mkdir");
        init_repo(&repo).await;

        let git = GitRepository::discover(repo.join("src/deep"))
            .await
            .expect("discover");
        assert_eq!(git.name(), "my-project");
        assert_eq!(
            git.root().canonicalize().unwrap(),
            repo.canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn discover_outside_a_repository_fails() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let result = GitRepository::discover(dir.path()).await;
        assert!(matches!(result, Err(IndexerError::InvalidPath(_))));
    }
}

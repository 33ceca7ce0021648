//! Thin wrapper around the `git` executable.
//!
//! Arguments are passed straight to the process, never through a shell.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git command failed: {message}")]
    CommandFailed { message: String },

    #[error("Git not installed or not in PATH")]
    GitNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

#[derive(Debug, Clone)]
pub struct Git {
    repo_root: PathBuf,
}

impl Git {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<GitOutput, GitError> {
        debug!(args = ?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitError::GitNotFound
                } else {
                    GitError::Io(e)
                }
            })?;

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn run_checked(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(args).await?;
        if !output.success {
            return Err(GitError::CommandFailed {
                message: format!("git {}: {}", args.join(" "), output.stderr),
            });
        }
        Ok(output.stdout)
    }

    pub async fn inside_repository(&self) -> bool {
        matches!(self.run(&["status"]).await, Ok(output) if output.success)
    }

    pub async fn remotes(&self) -> Result<Vec<String>, GitError> {
        let stdout = self.run_checked(&["remote"]).await?;
        Ok(stdout.lines().map(|l| l.trim().to_string()).collect())
    }

    pub async fn remote_exists(&self, name: &str) -> Result<bool, GitError> {
        Ok(self.remotes().await?.iter().any(|remote| remote == name))
    }

    /// Point remote `name` at `url`, replacing any existing remote with that
    /// name.
    pub async fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        // a missing remote is fine here
        let _ = self.run(&["remote", "rm", name]).await?;
        self.run_checked(&["remote", "add", name, url]).await?;
        Ok(())
    }

    pub async fn remove_remote(&self, name: &str) -> Result<(), GitError> {
        self.run_checked(&["remote", "rm", name]).await?;
        Ok(())
    }

    pub async fn fetch_remote(&self, name: &str) -> Result<(), GitError> {
        self.run_checked(&["fetch", name]).await?;
        Ok(())
    }

    /// `git checkout -b <name> --track <name>/master`
    pub async fn add_tracking_branch(&self, name: &str) -> Result<(), GitError> {
        let upstream = format!("{name}/master");
        self.run_checked(&["checkout", "-b", name, "--track", &upstream])
            .await?;
        Ok(())
    }

    /// `git config user.email`, when set.
    pub async fn user_email(&self) -> Option<String> {
        match self.run(&["config", "user.email"]).await {
            Ok(output) if output.success && !output.stdout.is_empty() => Some(output.stdout),
            _ => None,
        }
    }

    pub async fn current_commit(&self) -> Result<String, GitError> {
        self.run_checked(&["rev-parse", "HEAD"]).await
    }

    /// One line per commit not yet deployed:
    /// `<short sha> <subject> (<relative date>)`.
    pub async fn pending_commits(&self, deployed_sha: &str) -> Result<Vec<String>, GitError> {
        let head = self.current_commit().await?;
        let range = format!("{deployed_sha}..{head}");
        let stdout = self
            .run_checked(&[
                "log",
                "--no-merges",
                "--oneline",
                "--pretty=format:%h %s (%cr)",
                &range,
            ])
            .await?;
        Ok(stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let git = Git::new(dir.path());
        git.run_checked(&["init", "-q"]).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_outside_repository() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        assert!(!Git::new(dir.path()).inside_repository().await);
    }

    #[tokio::test]
    async fn test_remote_lifecycle() {
        if !git_available() {
            return;
        }
        let dir = init_repo().await;
        let git = Git::new(dir.path());
        assert!(git.inside_repository().await);

        assert!(!git.remote_exists("foo-staging").await.unwrap());
        git.add_remote("foo-staging", "git@git.example.com:foo-staging.git")
            .await
            .unwrap();
        assert!(git.remote_exists("foo-staging").await.unwrap());
        // a remote whose name merely contains the code name does not count
        assert!(!git.remote_exists("foo").await.unwrap());

        // re-adding replaces the existing remote
        git.add_remote("foo-staging", "git@git.example.com:other.git")
            .await
            .unwrap();
        let url = git
            .run_checked(&["remote", "get-url", "foo-staging"])
            .await
            .unwrap();
        assert_eq!(url, "git@git.example.com:other.git");

        git.remove_remote("foo-staging").await.unwrap();
        assert!(!git.remote_exists("foo-staging").await.unwrap());
        assert!(git.remove_remote("foo-staging").await.is_err());
    }
}

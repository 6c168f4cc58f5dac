//! Git plumbing for repository sources
//!
//! All repository access shells out to the `git` binary through
//! [`tokio::process::Command`]; a failed invocation surfaces as
//! [`GleanError::Git`] carrying the operation name and stderr.

use crate::{GleanError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// A local clone of one repository source
pub struct GitSync {
    repo_path: PathBuf,
}

impl GitSync {
    pub fn new(repo_path: PathBuf) -> GitSync {
        GitSync { repo_path }
    }

    /// Working-tree root of the clone
    pub fn path(&self) -> &Path {
        &self.repo_path
    }

    /// Clones the repository if the local path does not exist yet,
    /// otherwise pulls the default branch
    pub async fn clone_or_update(&self, remote_url: &str) -> Result<()> {
        let path = self.repo_path.to_string_lossy().into_owned();
        if self.repo_path.exists() {
            tracing::info!("Updating existing repository at {}", path);
            self.git("pull", &["-C", &path, "pull"]).await?;
        } else {
            tracing::info!("Cloning {} to {}", remote_url, path);
            self.git("clone", &["clone", remote_url, &path]).await?;
        }
        Ok(())
    }

    /// Commit hash of the current HEAD
    pub async fn head_hash(&self) -> Result<String> {
        let path = self.repo_path.to_string_lossy().into_owned();
        let stdout = self
            .git("rev-parse", &["-C", &path, "rev-parse", "HEAD"])
            .await?;
        Ok(stdout.trim().to_string())
    }

    /// Paths touched between `previous` and HEAD
    ///
    /// Renames contribute both sides, and deletions are included; callers
    /// discover a deleted path when the file fails to read.
    pub async fn changed_files(&self, previous: &str) -> Result<Vec<String>> {
        let path = self.repo_path.to_string_lossy().into_owned();
        let range = format!("{previous}..HEAD");
        let stdout = self
            .git("diff", &["-C", &path, "diff", "--name-status", &range])
            .await?;

        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for line in stdout.lines() {
            let mut parts = line.split('\t');
            // First column is the status letter
            let _ = parts.next();
            for file in parts {
                if !file.is_empty() && seen.insert(file.to_string()) {
                    files.push(file.to_string());
                }
            }
        }
        Ok(files)
    }

    /// Every tracked path in the working tree
    pub async fn tracked_files(&self) -> Result<Vec<String>> {
        let path = self.repo_path.to_string_lossy().into_owned();
        let stdout = self.git("ls-files", &["-C", &path, "ls-files"]).await?;
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn git(&self, operation: &str, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .output()
            .await
            .map_err(|e| GleanError::Git {
                operation: operation.to_string(),
                repo: self.repo_path.display().to_string(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GleanError::Git {
                operation: operation.to_string(),
                repo: self.repo_path.display().to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

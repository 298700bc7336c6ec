//! Git-backed environment: clean-start check and per-iteration commits.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, info};

use super::{CleanCheck, Environment};
use crate::error::{RalphError, Result};

/// Placeholder replaced by the iteration number in commit messages
pub const ITERATION_PLACEHOLDER: &str = "{iteration}";

/// Post-iteration git behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOptions {
    pub commit_after_iteration: bool,
    pub push: bool,
    pub commit_message: String,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            commit_after_iteration: true,
            push: false,
            commit_message: format!("Ralph iteration {}", ITERATION_PLACEHOLDER),
        }
    }
}

/// Environment backed by the git repository at `repo_root`.
///
/// Paths under `ignore_dir` (the loop's own state directory) never make the
/// tree dirty and are never committed.
#[derive(Debug, Clone)]
pub struct GitEnvironment {
    repo_root: PathBuf,
    ignore_dir: String,
    options: GitOptions,
}

impl GitEnvironment {
    pub fn new(repo_root: impl Into<PathBuf>, ignore_dir: impl Into<String>, options: GitOptions) -> Self {
        let ignore_dir = ignore_dir.into().trim_end_matches('/').to_string();
        Self {
            repo_root: repo_root.into(),
            ignore_dir,
            options,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| RalphError::Environment(format!("Failed to execute git: {}", e)))
    }

    fn git_checked(&self, args: &[&str], what: &str) -> Result<Output> {
        let output = self.git(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RalphError::Environment(format!("Failed to {}: {}", what, stderr.trim())));
        }
        Ok(output)
    }

    fn is_ignored(&self, path: &str) -> bool {
        !self.ignore_dir.is_empty()
            && (path == self.ignore_dir || path.starts_with(&format!("{}/", self.ignore_dir)))
    }

    fn commit_message(&self, iteration: u32) -> String {
        self.options
            .commit_message
            .replace(ITERATION_PLACEHOLDER, &iteration.to_string())
    }
}

/// Path of one `git status --porcelain` line; the destination for renames.
fn porcelain_path(line: &str) -> Option<&str> {
    let path = line.get(3..)?.trim();
    let path = path.rsplit(" -> ").next().unwrap_or(path);
    let path = path.trim_matches('"');
    (!path.is_empty()).then_some(path)
}

impl Environment for GitEnvironment {
    fn check_clean(&self) -> Result<CleanCheck> {
        let output = self.git_checked(&["status", "--porcelain"], "read git status")?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let changes: Vec<String> = stdout
            .lines()
            .filter_map(porcelain_path)
            .filter(|path| !self.is_ignored(path))
            .map(String::from)
            .collect();

        if changes.is_empty() {
            Ok(CleanCheck::clean())
        } else {
            debug!("Working tree has {} uncommitted changes", changes.len());
            Ok(CleanCheck::dirty(changes))
        }
    }

    fn after_iteration(&self, iteration: u32) -> Result<()> {
        if !self.options.commit_after_iteration {
            return Ok(());
        }

        let exclude = format!(":(exclude){}", self.ignore_dir);
        let mut add_args = vec!["add", "-A", "--", "."];
        if !self.ignore_dir.is_empty() {
            add_args.push(exclude.as_str());
        }
        self.git_checked(&add_args, "stage changes")?;

        // exit 0 means nothing staged
        if self.git(&["diff", "--cached", "--quiet"])?.status.success() {
            debug!("Iteration {}: nothing to commit", iteration);
            return Ok(());
        }

        let message = self.commit_message(iteration);
        self.git_checked(&["commit", "-m", &message], "commit")?;
        info!("Committed: {}", message);

        if self.options.push {
            self.git_checked(&["push"], "push")?;
            info!("Pushed iteration {}", iteration);
        }

        Ok(())
    }
}

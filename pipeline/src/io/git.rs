//! Git adapter for the pipeline.
//!
//! The orchestrator never mutates the tree itself (the PR-maker agent does
//! the staging and committing), so this wrapper only snapshots state: status
//! blobs for prompts, the clean/dirty check that gates PR creation, and
//! branch discovery for the PR context.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Raw `git status --porcelain` output, forwarded verbatim into prompts.
    pub fn status_snapshot(&self) -> Result<String> {
        self.run_capture(&["status", "--porcelain=v1", "-uall"])
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_entries(&self) -> Result<Vec<StatusEntry>> {
        let out = self.status_snapshot()?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// True if the worktree has changes outside the given path prefixes.
    ///
    /// The pipeline's own artifacts (review reports, run logs) must not by
    /// themselves trigger PR creation, so finalize passes them as allowed.
    #[instrument(skip_all)]
    pub fn has_changes_except_prefixes(&self, allowed_prefixes: &[&str]) -> Result<bool> {
        let entries = self.status_entries()?;
        let dirty = entries.iter().any(|entry| {
            !allowed_prefixes
                .iter()
                .any(|prefix| entry.path.starts_with(prefix))
        });
        debug!(dirty, "checked worktree state");
        Ok(dirty)
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to run)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// True if an `origin` remote is configured.
    pub fn has_remote(&self) -> Result<bool> {
        let status = self.run(&["remote", "get-url", "origin"])?.status;
        Ok(status.success())
    }

    /// Detect the default branch of `origin`.
    ///
    /// Prefers the locally-recorded `refs/remotes/origin/HEAD`; falls back to
    /// asking the remote via `ls-remote --symref`, which also works for
    /// file-path remotes.
    #[instrument(skip_all)]
    pub fn default_branch(&self) -> Result<String> {
        if let Ok(out) = self.run_capture(&["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
        {
            let name = out.trim();
            if let Some(branch) = name.strip_prefix("origin/") {
                debug!(branch, "default branch from origin/HEAD");
                return Ok(branch.to_string());
            }
        }
        let out = self
            .run_capture(&["ls-remote", "--symref", "origin", "HEAD"])
            .context("query origin for default branch")?;
        let branch = parse_symref_head(&out)
            .ok_or_else(|| anyhow!("could not determine default branch of origin"))?;
        debug!(branch = %branch, "default branch from ls-remote");
        Ok(branch)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}

/// Extract the branch name from `git ls-remote --symref origin HEAD` output.
fn parse_symref_head(out: &str) -> Option<String> {
    for line in out.lines() {
        if let Some(rest) = line.strip_prefix("ref:") {
            let target = rest.split_whitespace().next()?;
            if let Some(branch) = target.strip_prefix("refs/heads/") {
                return Some(branch.to_string());
            }
        }
    }
    None
}

//! Upstream git repository management for tests
//!
//! Builds throwaway repositories with the `git` CLI so the clone cache and the
//! local history strategy run against real objects.

#![allow(dead_code)]

use flake_navigator::core::error::{FlakeNavigatorError, Result};
use flake_navigator::core::input::{FlakeInput, InputKind};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// An upstream repository; the TempDir must be kept alive for the duration
/// of the test to prevent cleanup.
pub struct UpstreamRepo {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl UpstreamRepo {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `git+file://` URL as it appears in flake metadata
    pub fn flake_url(&self) -> String {
        format!("git+file://{}", self.path.display())
    }

    /// A `git` input pinned to `rev`
    pub fn input(&self, name: &str, rev: &str) -> FlakeInput {
        FlakeInput::new(name, InputKind::Git, self.flake_url()).with_rev(rev)
    }

    /// Create an empty commit and return its full SHA
    pub fn commit(&self, message: &str) -> Result<String> {
        git(&self.path, &["commit", "--allow-empty", "--quiet", "-m", message])?;
        head_sha(&self.path)
    }

    /// Create `count` commits named `{prefix} {n}` and return their SHAs, oldest first
    pub fn commits(&self, prefix: &str, count: usize) -> Result<Vec<String>> {
        (1..=count)
            .map(|n| self.commit(&format!("{prefix} {n}")))
            .collect()
    }

    /// Create branch `name` at the current commit without switching to it
    pub fn branch(&self, name: &str) -> Result<()> {
        git(&self.path, &["branch", "--quiet", name])?;
        Ok(())
    }

    /// Switch the working branch so later commits land on `name`
    pub fn switch(&self, name: &str) -> Result<()> {
        git(&self.path, &["checkout", "--quiet", name])?;
        Ok(())
    }

    /// Rewrite `main` to a fresh root commit, as a force-push would
    pub fn rewrite_history(&self, message: &str) -> Result<String> {
        git(&self.path, &["checkout", "--quiet", "--orphan", "rewritten"])?;
        git(&self.path, &["commit", "--allow-empty", "--quiet", "-m", message])?;
        git(&self.path, &["branch", "--quiet", "-M", "rewritten", "main"])?;
        head_sha(&self.path)
    }
}

/// Sets up an upstream repository on branch `main` without commits
pub fn setup_upstream_repo() -> Result<UpstreamRepo> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("upstream");
    std::fs::create_dir_all(&path)?;

    git(&path, &["init", "--quiet"])?;
    git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    // Set git config to avoid prompts during tests
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["config", "commit.gpgsign", "false"])?;

    Ok(UpstreamRepo { temp_dir, path })
}

pub fn git(path: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git").args(args).current_dir(path).output()?;
    if !output.status.success() {
        return Err(FlakeNavigatorError::tool_failed(
            format!("git {}", args.join(" ")),
            String::from_utf8_lossy(&output.stderr),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn head_sha(path: &Path) -> Result<String> {
    Ok(git(path, &["rev-parse", "HEAD"])?.trim().to_string())
}

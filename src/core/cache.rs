//! Persistent cache of bare, blob-less clones.
//!
//! # Public API
//! - [`CloneCache`]: Clone-or-fetch entry point used by the local history strategy
//! - [`CacheCheckout`] / [`EnsureOutcome`]: Where the entry lives and what was done
//! - [`cache_key`]: Directory name for a remote
//!
//! Entries live under `<root>/<fragment>-<md5>`, where the fragment is a readable
//! slice of the URL and the md5 keeps names unique. Work on one entry is serialized
//! by a per-key async mutex; different remotes proceed concurrently. An entry
//! that can't be opened as a bare repository is treated as a leftover partial
//! clone and replaced.
//!
//! One entry serves every input that shares a remote, whatever ref each follows.
//! A clone made for one branch starts out tracking only that branch; the refspec
//! is widened to every head as soon as another ref is asked for. Inputs without a
//! ref walk the remote's default branch as reported by `ls-remote`, never the
//! bare HEAD, which points at whichever branch the entry was first cloned for.

use crate::core::error::{FlakeNavigatorError, HistoryError, ProcessError};
use crate::core::forge::git_remote;
use crate::core::process::CommandRunner;
use git2::Repository;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const FRAGMENT_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Cloned,
    Fetched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCheckout {
    pub path: PathBuf,
    /// Revision to walk inside the entry for the requested ref
    pub revision: String,
    pub outcome: EnsureOutcome,
}

pub struct CloneCache {
    root: PathBuf,
    runner: CommandRunner,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CloneCache {
    pub fn new(root: impl Into<PathBuf>, runner: CommandRunner) -> Self {
        Self {
            root: root.into(),
            runner,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.root.join(cache_key(url))
    }

    /// Make sure an up-to-date bare clone of `url` exists and return its path.
    ///
    /// `reference` restricts the clone to one branch when given; `HEAD` means the
    /// remote default.
    pub async fn ensure(
        &self,
        url: &str,
        reference: Option<&str>,
    ) -> Result<CacheCheckout, HistoryError> {
        let key = cache_key(url);
        let lock = self.lock_for(&key);
        let _guard = tokio::select! {
            _ = self.runner.cancel_token().cancelled() => return Err(HistoryError::Aborted),
            guard = lock.lock() => guard,
        };

        let path = self.root.join(&key);
        let remote = git_remote(url);
        let reference = reference.filter(|r| !r.is_empty() && *r != "HEAD");

        if path.exists() {
            if Repository::open_bare(&path).is_ok() {
                let revision = self.refresh(&path, reference).await?;
                return Ok(CacheCheckout {
                    path,
                    revision,
                    outcome: EnsureOutcome::Fetched,
                });
            }
            log::warn!("Discarding unusable cache entry {}", path.display());
            remove_entry(&path)?;
        }

        std::fs::create_dir_all(&self.root)
            .map_err(|e| HistoryError::cache(format!("{}: {e}", self.root.display())))?;

        if let Err(err) = self.clone_bare(&remote, reference, &path).await {
            // A failed clone must not leave a half-written entry behind
            if path.exists() {
                remove_entry(&path)?;
            }
            return Err(err);
        }

        Ok(CacheCheckout {
            path,
            revision: reference.unwrap_or("HEAD").to_string(),
            outcome: EnsureOutcome::Cloned,
        })
    }

    /// Delete every cache entry; returns whether anything was removed
    pub fn clear(&self) -> Result<bool, FlakeNavigatorError> {
        if !self.root.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&self.root)
            .map_err(|e| FlakeNavigatorError::cache_clear_failed(&self.root, e))?;
        log::debug!("Cleared clone cache at {}", self.root.display());
        Ok(true)
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(key.to_string()).or_default().clone()
    }

    async fn clone_bare(
        &self,
        remote: &str,
        reference: Option<&str>,
        path: &Path,
    ) -> Result<(), HistoryError> {
        let target = path.to_string_lossy();
        let mut args = vec!["clone", "--bare", "--quiet", "--filter=blob:none"];
        if let Some(reference) = reference {
            args.extend(["--single-branch", "--branch", reference]);
        }
        args.extend([remote, &*target]);

        log::debug!("Cloning {remote} into {}", path.display());
        match self.runner.run("git", &args, None).await {
            Ok(_) => {}
            Err(err) if reference.is_some() => {
                let err = HistoryError::from(err);
                if err == HistoryError::Aborted {
                    return Err(err);
                }
                log::debug!("Single-branch clone failed ({err}), retrying full clone");
                if path.exists() {
                    remove_entry(path)?;
                }
                self.runner
                    .run(
                        "git",
                        [
                            "clone",
                            "--bare",
                            "--quiet",
                            "--filter=blob:none",
                            remote,
                            &*target,
                        ],
                        None,
                    )
                    .await?;
                return configure_fetch_refspec(path, None);
            }
            Err(err) => return Err(err.into()),
        }

        configure_fetch_refspec(path, reference)
    }

    /// Fetch an existing entry, widening its refspec first when the wanted
    /// revision was never fetched into it
    async fn refresh(&self, path: &Path, reference: Option<&str>) -> Result<String, HistoryError> {
        let revision = match reference {
            Some(reference) => reference.to_string(),
            None => self.default_branch(path).await?,
        };
        if !has_revision(path, &revision) {
            log::debug!(
                "{} has no {revision} yet, tracking every branch",
                path.display()
            );
            configure_fetch_refspec(path, None)?;
        }
        self.fetch(path).await?;
        Ok(revision)
    }

    async fn default_branch(&self, path: &Path) -> Result<String, HistoryError> {
        match self
            .runner
            .run("git", ["ls-remote", "--symref", "origin", "HEAD"], Some(path))
            .await
        {
            Ok(output) => Ok(parse_symref(&output).unwrap_or_else(|| "HEAD".to_string())),
            Err(ProcessError::Aborted) => Err(HistoryError::Aborted),
            Err(err) => {
                log::debug!("Default branch lookup failed in {}: {err}", path.display());
                Ok("HEAD".to_string())
            }
        }
    }

    async fn fetch(&self, path: &Path) -> Result<(), HistoryError> {
        log::debug!("Refreshing cache entry {}", path.display());
        self.runner
            .run("git", ["fetch", "--all", "--prune", "--quiet"], Some(path))
            .await?;
        Ok(())
    }
}

/// A bare clone records no fetch refspec, so later fetches would not move any
/// branch. Track the followed branch when it exists, otherwise every head.
fn configure_fetch_refspec(path: &Path, reference: Option<&str>) -> Result<(), HistoryError> {
    let repo = Repository::open_bare(path).map_err(|e| HistoryError::cache(e.message()))?;
    let branch = reference.filter(|r| {
        repo.find_reference(&format!("refs/heads/{r}")).is_ok()
    });
    let refspec = match branch {
        Some(branch) => format!("+refs/heads/{branch}:refs/heads/{branch}"),
        None => "+refs/heads/*:refs/heads/*".to_string(),
    };

    let mut config = repo.config().map_err(|e| HistoryError::cache(e.message()))?;
    config
        .set_str("remote.origin.fetch", &refspec)
        .map_err(|e| HistoryError::cache(e.message()))?;
    log::debug!("Configured {} with refspec {refspec}", path.display());
    Ok(())
}

fn has_revision(path: &Path, revision: &str) -> bool {
    match Repository::open_bare(path) {
        Ok(repo) => {
            let found = repo.revparse_single(revision).is_ok();
            found
        }
        Err(_) => false,
    }
}

/// Branch named by the `ref:` line of `git ls-remote --symref <remote> HEAD`
fn parse_symref(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (target, name) = line.strip_prefix("ref:")?.trim().split_once('\t')?;
        (name.trim() == "HEAD").then(|| target.trim().to_string())
    })
}

fn remove_entry(path: &Path) -> Result<(), HistoryError> {
    std::fs::remove_dir_all(path)
        .map_err(|e| HistoryError::cache(format!("{}: {e}", path.display())))
}

/// Cache directory name for a remote URL
pub fn cache_key(url: &str) -> String {
    let normalized = git_remote(url.trim());
    let normalized = normalized.trim_end_matches('/');
    let normalized = normalized.strip_suffix(".git").unwrap_or(normalized);

    let path_part = normalized
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(normalized);
    let fragment: String = path_part
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let fragment = fragment.trim_matches('_');
    let start = fragment.len().saturating_sub(FRAGMENT_LEN);

    format!(
        "{}-{:x}",
        &fragment[start..],
        md5::compute(normalized.as_bytes())
    )
}

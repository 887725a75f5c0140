//! Commit history read from the local clone cache.
//!
//! This is the strategy for remotes without a usable API, and the fallback when a
//! forge API refuses a request. It shells out to `git` inside a cached bare clone
//! (see [`crate::core::cache`]).
//!
//! # Public API
//! - [`LocalHistory`]: Walk an input's history around its pinned revision
//! - [`parse_log`]: Parse `git log` output produced with [`LOG_FORMAT`]
//!
//! # Traversal
//! - Pin is an ancestor of the followed ref: `rev..ref` lists the commits ahead,
//!   `log rev` lists the pin and its ancestors
//! - Otherwise (force-push, unknown revision): a capped log of the ref is scanned
//!   for the pin, and the list is returned without a pin marker if it is absent

use crate::core::cache::CloneCache;
use crate::core::changelog::Traversal;
use crate::core::commit::{revision_matches, Commit};
use crate::core::config::EngineConfig;
use crate::core::error::{HistoryError, ProcessError};
use crate::core::forge::RepoInfo;
use crate::core::input::FlakeInput;
use crate::core::process::CommandRunner;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

/// Fields separated by ASCII unit separators; the subject goes last
pub const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%aI%x1f%s";

pub struct LocalHistory {
    cache: Arc<CloneCache>,
    runner: CommandRunner,
    config: EngineConfig,
}

impl LocalHistory {
    pub fn new(cache: Arc<CloneCache>, runner: CommandRunner, config: EngineConfig) -> Self {
        Self {
            cache,
            runner,
            config,
        }
    }

    pub fn cache(&self) -> &CloneCache {
        &self.cache
    }

    pub async fn traverse(
        &self,
        input: &FlakeInput,
        info: &RepoInfo,
    ) -> Result<Traversal, HistoryError> {
        if input.rev.is_empty() {
            return Err(HistoryError::malformed(format!(
                "input '{}' has no locked revision",
                input.name
            )));
        }

        let checkout = self
            .cache
            .ensure(&info.clone_url(), input.reference.as_deref())
            .await?;
        let repo = checkout.path.as_path();
        let reference = checkout.revision.as_str();

        if self.is_ancestor(repo, &input.rev, reference).await? {
            let ahead = self
                .log(repo, info, &format!("{}..{}", input.rev, reference), self.config.ahead_limit)
                .await?;
            let behind = self
                .log(repo, info, &input.rev, self.config.behind_limit)
                .await?;
            log::debug!(
                "{}: {} commits ahead of {}",
                input.name,
                ahead.len(),
                input.short_rev()
            );
            return Ok(Traversal::Anchored { ahead, behind });
        }

        log::debug!(
            "{}: {} is not an ancestor of {}, scanning flat log",
            input.name,
            input.short_rev(),
            reference
        );
        let commits = self
            .log(repo, info, reference, self.config.flat_log_limit)
            .await?;
        let pinned = commits
            .iter()
            .position(|commit| revision_matches(&commit.sha, &input.rev));
        Ok(Traversal::Flat { commits, pinned })
    }

    async fn is_ancestor(
        &self,
        repo: &Path,
        rev: &str,
        reference: &str,
    ) -> Result<bool, HistoryError> {
        match self
            .runner
            .run("git", ["merge-base", "--is-ancestor", rev, reference], Some(repo))
            .await
        {
            Ok(_) => Ok(true),
            // Exit 1 means "not an ancestor", 128 an unknown revision
            Err(ProcessError::Failed { code: Some(1 | 128), .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn log(
        &self,
        repo: &Path,
        info: &RepoInfo,
        range: &str,
        limit: usize,
    ) -> Result<Vec<Commit>, HistoryError> {
        let max_count = format!("--max-count={limit}");
        let output = self
            .runner
            .run("git", ["log", max_count.as_str(), LOG_FORMAT, range, "--"], Some(repo))
            .await?;
        Ok(parse_log(&output, info))
    }
}

/// Parse `git log` output written with [`LOG_FORMAT`]
pub fn parse_log(output: &str, info: &RepoInfo) -> Vec<Commit> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut fields = line.splitn(4, '\u{1f}');
            let sha = fields.next()?.trim();
            let author = fields.next()?;
            let date = fields.next()?;
            let subject = fields.next().unwrap_or_default();

            let date = match DateTime::parse_from_rfc3339(date) {
                Ok(date) => date.with_timezone(&Utc),
                Err(e) => {
                    log::debug!("Skipping commit {sha} with bad date '{date}': {e}");
                    return None;
                }
            };

            let mut commit = Commit::new(sha, subject, author, date);
            commit.web_url = info.commit_url(sha);
            Some(commit)
        })
        .collect()
}

//! Commit history around an input's pinned revision.
//!
//! # Public API
//! - [`CommitHistory`]: The seam used by the update checker and the changelog view
//! - [`HistoryService`]: Picks the forge API when there is one, the clone cache otherwise
//!
//! An API failure other than a rate limit, an authentication error or an abort
//! falls back to the local clone, since private repositories often answer 404
//! over HTTP but clone fine over SSH. When the clone fails as well, the API
//! error is the one reported.

use crate::core::cache::CloneCache;
use crate::core::changelog::Traversal;
use crate::core::commit::{ChangelogResult, Commit};
use crate::core::config::{ApiTokens, EngineConfig};
use crate::core::dirs::get_clone_cache_directory;
use crate::core::error::{FlakeNavigatorError, HistoryError};
use crate::core::forge::RepoInfo;
use crate::core::forge_api::ForgeApi;
use crate::core::git::LocalHistory;
use crate::core::http::{HttpTransport, ReqwestTransport};
use crate::core::input::FlakeInput;
use crate::core::process::CommandRunner;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait CommitHistory: Send + Sync {
    /// Commits on the followed ref that are newer than the pin
    async fn commits_since(
        &self,
        input: &FlakeInput,
        info: &RepoInfo,
    ) -> Result<Vec<Commit>, HistoryError>;

    /// Commits ahead of the pin, the pin, then its ancestors
    async fn changelog(
        &self,
        input: &FlakeInput,
        info: &RepoInfo,
    ) -> Result<ChangelogResult, HistoryError>;
}

pub struct HistoryService {
    api: ForgeApi,
    local: LocalHistory,
}

impl HistoryService {
    pub fn new(api: ForgeApi, local: LocalHistory) -> Self {
        Self { api, local }
    }

    /// Wire the production strategies: reqwest for APIs, the user cache for clones
    pub fn with_defaults(
        config: &EngineConfig,
        tokens: ApiTokens,
        cancel: CancellationToken,
    ) -> Result<Self, FlakeNavigatorError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(
            ReqwestTransport::new(config.http_timeout())
                .map_err(|e| FlakeNavigatorError::tool_failed("http client", e.to_string()))?,
        );
        let runner = CommandRunner::new(cancel.clone(), config.git_timeout());
        let cache = Arc::new(CloneCache::new(get_clone_cache_directory()?, runner.clone()));

        Ok(Self::new(
            ForgeApi::new(transport, tokens, config.clone(), cancel),
            LocalHistory::new(cache, runner, config.clone()),
        ))
    }

    async fn traverse(
        &self,
        input: &FlakeInput,
        info: &RepoInfo,
    ) -> Result<Traversal, HistoryError> {
        let api_error = if info.forge.has_api() {
            match self.api.traverse(input, info).await {
                Ok(traversal) => return Ok(traversal),
                Err(err) if err.is_terminal() => return Err(err),
                Err(err) => {
                    log::debug!(
                        "{}: {} API unavailable ({err}), using local clone",
                        input.name,
                        info.kind()
                    );
                    Some(err)
                }
            }
        } else {
            None
        };

        match (self.local.traverse(input, info).await, api_error) {
            (Err(local_error), Some(api_error)) if local_error != HistoryError::Aborted => {
                log::warn!(
                    "{}: local clone failed after API error ({local_error})",
                    input.name
                );
                Err(api_error)
            }
            (result, _) => result,
        }
    }
}

#[async_trait]
impl CommitHistory for HistoryService {
    async fn commits_since(
        &self,
        input: &FlakeInput,
        info: &RepoInfo,
    ) -> Result<Vec<Commit>, HistoryError> {
        Ok(self.traverse(input, info).await?.commits_since())
    }

    async fn changelog(
        &self,
        input: &FlakeInput,
        info: &RepoInfo,
    ) -> Result<ChangelogResult, HistoryError> {
        Ok(self.traverse(input, info).await?.into_changelog(&input.rev))
    }
}

//! Engine configuration and API credentials.
//!
//! [`EngineConfig`] is read from `config.json` in the config directory when present.
//! Every field has a default, so a partial file only overrides what it names.
//! [`ApiTokens`] always comes from the environment.

use crate::core::dirs::get_config_directory;
use crate::core::error::FlakeNavigatorError;
use crate::core::forge::ForgeKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub git_timeout_secs: u64,
    pub nix_timeout_secs: u64,
    pub http_timeout_secs: u64,
    /// Commits requested per API page
    pub page_size: usize,
    pub max_pages_authenticated: usize,
    pub max_pages_anonymous: usize,
    pub batch_size_authenticated: usize,
    pub batch_size_anonymous: usize,
    /// Upper bound on commits listed ahead of the pin
    pub ahead_limit: usize,
    /// Commits listed at and below the pin in a changelog
    pub behind_limit: usize,
    /// Length of the fallback log when the pin is not an ancestor
    pub flat_log_limit: usize,
    /// Pause between consecutive API pages
    pub page_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            git_timeout_secs: 120,
            nix_timeout_secs: 120,
            http_timeout_secs: 30,
            page_size: 100,
            max_pages_authenticated: 10,
            max_pages_anonymous: 3,
            batch_size_authenticated: 8,
            batch_size_anonymous: 3,
            ahead_limit: 500,
            behind_limit: 50,
            flat_log_limit: 200,
            page_delay_ms: 100,
        }
    }
}

impl EngineConfig {
    /// Load `config.json` from the config directory, falling back to defaults
    pub fn load_or_default() -> Result<Self, FlakeNavigatorError> {
        let config_file = get_config_directory()?.join("config.json");
        Self::load_from(&config_file)
    }

    pub fn load_from(config_file: &Path) -> Result<Self, FlakeNavigatorError> {
        if !config_file.exists() {
            log::debug!("No config at {}, using defaults", config_file.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_file)?;
        let config = serde_json::from_str(&content)
            .map_err(|e| FlakeNavigatorError::config_parse_failed(config_file, e))?;
        log::debug!("Loaded config from {}", config_file.display());
        Ok(config)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn nix_timeout(&self) -> Duration {
        Duration::from_secs(self.nix_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn batch_size(&self, authenticated: bool) -> usize {
        let size = if authenticated {
            self.batch_size_authenticated
        } else {
            self.batch_size_anonymous
        };
        size.max(1)
    }

    pub fn max_pages(&self, authenticated: bool) -> usize {
        if authenticated {
            self.max_pages_authenticated
        } else {
            self.max_pages_anonymous
        }
    }
}

/// Forge API tokens read from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiTokens {
    pub github: Option<String>,
    pub gitlab: Option<String>,
    pub gitea: Option<String>,
    pub sourcehut: Option<String>,
}

impl ApiTokens {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        Self {
            github: first(&["GITHUB_TOKEN", "GH_TOKEN"]),
            gitlab: first(&["GITLAB_TOKEN"]),
            gitea: first(&["GITEA_TOKEN", "CODEBERG_TOKEN"]),
            sourcehut: first(&["SRHT_TOKEN"]),
        }
    }

    pub fn for_forge(&self, kind: ForgeKind) -> Option<&str> {
        match kind {
            ForgeKind::GitHub => self.github.as_deref(),
            ForgeKind::GitLab => self.gitlab.as_deref(),
            ForgeKind::Codeberg | ForgeKind::Gitea => self.gitea.as_deref(),
            ForgeKind::SourceHut => self.sourcehut.as_deref(),
            ForgeKind::Generic => None,
        }
    }

    /// Whether any token is available; GitHub dominates typical flakes
    pub fn is_authenticated(&self) -> bool {
        self.github.is_some()
    }
}

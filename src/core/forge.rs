//! Hosting forges and resolved repository coordinates.
//!
//! # Public API
//! - [`Forge`]: Closed set of supported forges, carrying host details where they vary
//! - [`ForgeKind`]: Field-less tag of a [`Forge`] for tables and token lookup
//! - [`RepoInfo`]: Owner, repository and forge of an input, with URL helpers
//!
//! Self-hosted instances keep their host inside the variant, so every consumer
//! matches exhaustively instead of inspecting optional fields.

use std::fmt;

pub const GITHUB_HOST: &str = "github.com";
pub const GITLAB_HOST: &str = "gitlab.com";
pub const SOURCEHUT_HOST: &str = "git.sr.ht";
pub const CODEBERG_HOST: &str = "codeberg.org";
pub const GITEA_HOST: &str = "gitea.com";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Forge {
    GitHub,
    /// `None` means gitlab.com
    GitLab { host: Option<String> },
    /// `None` means git.sr.ht
    SourceHut { host: Option<String> },
    Codeberg,
    Gitea { host: String },
    /// Any other git remote, reached only through the clone cache
    Generic { remote: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForgeKind {
    GitHub,
    GitLab,
    SourceHut,
    Codeberg,
    Gitea,
    Generic,
}

impl ForgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForgeKind::GitHub => "GitHub",
            ForgeKind::GitLab => "GitLab",
            ForgeKind::SourceHut => "SourceHut",
            ForgeKind::Codeberg => "Codeberg",
            ForgeKind::Gitea => "Gitea",
            ForgeKind::Generic => "git",
        }
    }
}

impl fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Forge {
    pub fn kind(&self) -> ForgeKind {
        match self {
            Forge::GitHub => ForgeKind::GitHub,
            Forge::GitLab { .. } => ForgeKind::GitLab,
            Forge::SourceHut { .. } => ForgeKind::SourceHut,
            Forge::Codeberg => ForgeKind::Codeberg,
            Forge::Gitea { .. } => ForgeKind::Gitea,
            Forge::Generic { .. } => ForgeKind::Generic,
        }
    }

    /// Web host of the forge; `None` for generic remotes
    pub fn host(&self) -> Option<&str> {
        match self {
            Forge::GitHub => Some(GITHUB_HOST),
            Forge::GitLab { host } => Some(host.as_deref().unwrap_or(GITLAB_HOST)),
            Forge::SourceHut { host } => Some(host.as_deref().unwrap_or(SOURCEHUT_HOST)),
            Forge::Codeberg => Some(CODEBERG_HOST),
            Forge::Gitea { host } => Some(host),
            Forge::Generic { .. } => None,
        }
    }

    /// Whether commit history can be listed over a REST API
    pub fn has_api(&self) -> bool {
        !matches!(self, Forge::Generic { .. })
    }
}

/// Repository coordinates of a flake input
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoInfo {
    /// Owner without sourcehut's `~` prefix
    pub owner: String,
    pub repo: String,
    pub forge: Forge,
}

impl RepoInfo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, forge: Forge) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            forge,
        }
    }

    pub fn kind(&self) -> ForgeKind {
        self.forge.kind()
    }

    /// URL handed to `git clone`
    pub fn clone_url(&self) -> String {
        match &self.forge {
            Forge::SourceHut { .. } => format!(
                "https://{}/~{}/{}",
                self.forge.host().unwrap_or(SOURCEHUT_HOST),
                self.owner,
                self.repo
            ),
            Forge::Generic { remote } => git_remote(remote),
            forge => format!(
                "https://{}/{}/{}.git",
                forge.host().unwrap_or(GITHUB_HOST),
                self.owner,
                self.repo
            ),
        }
    }

    /// Browser URL of a commit, when the forge has a web UI we know
    pub fn commit_url(&self, sha: &str) -> Option<String> {
        let host = self.forge.host()?;
        let url = match &self.forge {
            Forge::GitLab { .. } => {
                format!("https://{host}/{}/{}/-/commit/{sha}", self.owner, self.repo)
            }
            Forge::SourceHut { .. } => {
                format!("https://{host}/~{}/{}/commit/{sha}", self.owner, self.repo)
            }
            _ => format!("https://{host}/{}/{}/commit/{sha}", self.owner, self.repo),
        };
        Some(url)
    }
}

impl fmt::Display for RepoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.forge {
            Forge::Generic { remote } => f.write_str(remote),
            Forge::SourceHut { .. } => write!(f, "~{}/{}", self.owner, self.repo),
            _ => write!(f, "{}/{}", self.owner, self.repo),
        }
    }
}

/// Strip the nix `git+` scheme prefix and any query so git can use the remote
pub fn git_remote(remote: &str) -> String {
    let remote = remote.strip_prefix("git+").unwrap_or(remote);
    let remote = remote.split(['?', '#']).next().unwrap_or(remote);
    remote.to_string()
}

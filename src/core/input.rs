//! Flake inputs as reported by the lock file.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::path::PathBuf;

/// The nix input type of a locked input
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputKind {
    GitHub,
    GitLab,
    SourceHut,
    Git,
    Path,
    Tarball,
    Other(String),
}

impl InputKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "github" => Self::GitHub,
            "gitlab" => Self::GitLab,
            "sourcehut" => Self::SourceHut,
            "git" => Self::Git,
            "path" => Self::Path,
            "tarball" | "file" => Self::Tarball,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::SourceHut => "sourcehut",
            Self::Git => "git",
            Self::Path => "path",
            Self::Tarball => "tarball",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One locked dependency of a flake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlakeInput {
    pub name: String,
    pub kind: InputKind,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub host: Option<String>,
    /// Branch or tag the input follows, if pinned to one
    pub reference: Option<String>,
    pub url: String,
    /// Full locked revision; empty when the input type has none
    pub rev: String,
    /// Unix timestamp of the locked revision
    pub last_modified: i64,
}

impl FlakeInput {
    pub fn new(name: impl Into<String>, kind: InputKind, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            owner: None,
            repo: None,
            host: None,
            reference: None,
            url: url.into(),
            rev: String::new(),
            last_modified: 0,
        }
    }

    pub fn with_repo(mut self, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self.repo = Some(repo.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = rev.into();
        self
    }

    pub fn with_last_modified(mut self, last_modified: i64) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn short_rev(&self) -> &str {
        let end = self
            .rev
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.rev.len());
        &self.rev[..end]
    }

    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        if self.last_modified <= 0 {
            return None;
        }
        Utc.timestamp_opt(self.last_modified, 0).single()
    }
}

/// A loaded flake and its inputs, sorted case-insensitively by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flake {
    pub path: PathBuf,
    pub description: Option<String>,
    pub inputs: Vec<FlakeInput>,
}

impl Flake {
    pub fn new(path: PathBuf, description: Option<String>, mut inputs: Vec<FlakeInput>) -> Self {
        inputs.sort_by_key(|input| input.name.to_lowercase());
        Self {
            path,
            description,
            inputs,
        }
    }

    pub fn input(&self, name: &str) -> Option<&FlakeInput> {
        self.inputs.iter().find(|input| input.name == name)
    }
}

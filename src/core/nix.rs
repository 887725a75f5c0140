//! The `nix` command-line tool: metadata loading and lock file updates.
//!
//! # Public API
//! - [`NixOperations`]: Async seam for everything that touches the lock file
//! - [`NixCli`]: Implementation running the real `nix` binary
//! - [`parse_metadata`]: Turn `nix flake metadata --json` output into a [`Flake`]
//! - [`resolve_flake_path`]: Accept a flake directory or its `flake.nix`

use crate::core::error::{FlakeNavigatorError, Result};
use crate::core::input::{Flake, FlakeInput, InputKind};
use crate::core::process::CommandRunner;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait NixOperations: Send + Sync {
    async fn load_metadata(&self, path: &Path) -> Result<Flake>;

    /// `nix flake update <names...>`
    async fn update_inputs(&self, path: &Path, names: &[String]) -> Result<()>;

    async fn update_all(&self, path: &Path) -> Result<()>;

    /// Pin `name` to `override_url` via `--override-input`
    async fn lock_input(&self, path: &Path, name: &str, override_url: &str) -> Result<()>;
}

pub struct NixCli {
    runner: CommandRunner,
}

impl NixCli {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    async fn nix(&self, args: &[&str]) -> Result<String> {
        Ok(self.runner.run("nix", args, None).await?)
    }
}

#[async_trait]
impl NixOperations for NixCli {
    async fn load_metadata(&self, path: &Path) -> Result<Flake> {
        let flake_path = resolve_flake_path(path)?;
        let path_str = flake_path.to_string_lossy();
        let output = self
            .nix(&[
                "flake",
                "metadata",
                "--json",
                "--no-update-lock-file",
                &path_str,
            ])
            .await?;
        parse_metadata(flake_path.clone(), &output)
    }

    async fn update_inputs(&self, path: &Path, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let path_str = path.to_string_lossy();
        let mut args = vec!["flake", "update"];
        args.extend(names.iter().map(String::as_str));
        args.extend(["--flake", &*path_str]);
        self.nix(&args).await?;
        log::debug!("Updated inputs {names:?} in {}", path.display());
        Ok(())
    }

    async fn update_all(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        self.nix(&["flake", "update", "--flake", &path_str]).await?;
        Ok(())
    }

    async fn lock_input(&self, path: &Path, name: &str, override_url: &str) -> Result<()> {
        let path_str = path.to_string_lossy();
        self.nix(&[
            "flake",
            "update",
            name,
            "--override-input",
            name,
            override_url,
            "--flake",
            &path_str,
        ])
        .await?;
        log::debug!("Locked {name} to {override_url}");
        Ok(())
    }
}

/// Resolve a user-supplied path to an absolute flake directory containing `flake.nix`
pub fn resolve_flake_path(path: &Path) -> Result<PathBuf> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    let dir = if path.file_name().is_some_and(|name| name == "flake.nix") {
        path.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    } else {
        path
    };

    let dir = dir
        .canonicalize()
        .map_err(|_| FlakeNavigatorError::flake_not_found(dir))?;
    if !dir.join("flake.nix").is_file() {
        return Err(FlakeNavigatorError::flake_not_found(dir));
    }
    Ok(dir)
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    locks: Locks,
}

#[derive(Debug, Deserialize, Default)]
struct Locks {
    #[serde(default)]
    nodes: HashMap<String, Node>,
    #[serde(default)]
    root: String,
}

#[derive(Debug, Deserialize, Default)]
struct Node {
    #[serde(default)]
    inputs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    locked: Option<SourceAttrs>,
    #[serde(default)]
    original: Option<SourceAttrs>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct SourceAttrs {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "lastModified", default)]
    last_modified: Option<i64>,
}

/// Parse `nix flake metadata --json` output
pub fn parse_metadata(path: PathBuf, json: &str) -> Result<Flake> {
    let metadata: Metadata =
        serde_json::from_str(json).map_err(|e| FlakeNavigatorError::metadata_parse(e.to_string()))?;
    let locks = &metadata.locks;
    let root = locks.nodes.get(&locks.root);

    let inputs = root
        .map(|root| {
            root.inputs
                .iter()
                .filter_map(|(name, target)| {
                    let node_name = follow_target(locks, target)?;
                    let node = locks.nodes.get(&node_name)?;
                    parse_input(name, node)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Flake::new(path, metadata.description, inputs))
}

/// A root input points at a node name, or at a `follows` path of input names
fn follow_target(locks: &Locks, target: &serde_json::Value) -> Option<String> {
    match target {
        serde_json::Value::String(name) => Some(name.clone()),
        serde_json::Value::Array(path) => {
            let mut node = locks.nodes.get(&locks.root)?;
            let mut current = None;
            for segment in path {
                let next = follow_target(locks, node.inputs.get(segment.as_str()?)?)?;
                node = locks.nodes.get(&next)?;
                current = Some(next);
            }
            current
        }
        _ => None,
    }
}

fn parse_input(name: &str, node: &Node) -> Option<FlakeInput> {
    let locked = node.locked.clone()?;
    let original = node.original.clone().unwrap_or_default();
    let pick = |a: &Option<String>, b: &Option<String>| a.clone().or_else(|| b.clone());

    let kind = InputKind::parse(
        pick(&locked.kind, &original.kind)
            .as_deref()
            .unwrap_or("other"),
    );
    let owner = pick(&locked.owner, &original.owner);
    let repo = pick(&locked.repo, &original.repo);
    let host = pick(&locked.host, &original.host);

    let url = match &kind {
        InputKind::GitHub | InputKind::GitLab | InputKind::SourceHut => {
            let owner = owner.as_deref().unwrap_or_default();
            let owner = match kind {
                InputKind::SourceHut if !owner.starts_with('~') => format!("~{owner}"),
                _ => owner.to_string(),
            };
            let mut url = format!("{kind}:{owner}/{}", repo.as_deref().unwrap_or_default());
            if let Some(host) = &host {
                url.push_str(&format!("?host={host}"));
            }
            url
        }
        InputKind::Path => format!(
            "path:{}",
            pick(&locked.path, &original.path).unwrap_or_default()
        ),
        _ => pick(&original.url, &locked.url).unwrap_or_else(|| "unknown".to_string()),
    };

    let mut input = FlakeInput::new(name, kind, url)
        .with_rev(locked.rev.clone().unwrap_or_default())
        .with_last_modified(locked.last_modified.unwrap_or(0));
    input.owner = owner;
    input.repo = repo;
    input.host = host;
    input.reference = original.reference.clone().or(locked.reference.clone());
    Some(input)
}

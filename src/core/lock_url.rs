//! Override expressions that pin an input to an arbitrary revision.
//!
//! The result is passed to `nix flake update <name> --override-input <name> <url>`.
//! Short-form schemes are used where nix has one for the host; everything else
//! becomes an explicit `git+` URL with a `rev` query.

use crate::core::forge::{git_remote, Forge, RepoInfo, SOURCEHUT_HOST};
use crate::core::input::FlakeInput;

/// Build the `--override-input` URL locking `input` to `rev`
pub fn lock_url(input: &FlakeInput, info: &RepoInfo, rev: &str) -> String {
    let RepoInfo { owner, repo, forge } = info;
    let url = match forge {
        Forge::GitHub => format!("github:{owner}/{repo}/{rev}"),
        // Subgroups are written with an encoded slash so nix keeps them in the owner
        Forge::GitLab { host: None } => {
            format!("gitlab:{}/{repo}/{rev}", owner.replace('/', "%2F"))
        }
        Forge::GitLab { host: Some(host) } => {
            format!("git+https://{host}/{owner}/{repo}?rev={rev}")
        }
        Forge::SourceHut { host } => match host.as_deref() {
            Some(host) if host != SOURCEHUT_HOST => {
                format!("sourcehut:~{owner}/{repo}/{rev}?host={host}")
            }
            _ => format!("sourcehut:~{owner}/{repo}/{rev}"),
        },
        Forge::Codeberg | Forge::Gitea { .. } => format!(
            "git+https://{}/{owner}/{repo}?rev={rev}",
            forge.host().unwrap_or_default()
        ),
        Forge::Generic { remote } => format!("git+{}?rev={rev}", normalize_remote(remote)),
    };
    log::debug!("Lock URL for '{}' at {}: {}", input.name, rev, url);
    url
}

/// Turn a remote into URL form: drop `git+` and queries, rewrite SCP syntax to `ssh://`
pub fn normalize_remote(remote: &str) -> String {
    let remote = git_remote(remote);
    if remote.contains("://") {
        return remote;
    }
    match remote.split_once(':') {
        Some((authority, path)) if !authority.contains('/') => {
            format!("ssh://{authority}/{}", path.trim_start_matches('/'))
        }
        _ => remote,
    }
}

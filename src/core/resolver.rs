//! Resolution of flake inputs to repository coordinates.
//!
//! # Public API
//! - [`resolve`]: Classify an input's forge and extract owner/repository
//! - [`forge_for_host`]: Map a host name to a [`Forge`]
//!
//! Short-form schemes (`github:`, `gitlab:`, `sourcehut:`) are trusted directly.
//! Everything else is parsed as a URL or SCP-style remote and classified by host,
//! first through a table of well-known hosts, then by name heuristics. A remote
//! that matches nothing becomes [`Forge::Generic`], so only inputs without a
//! remote at all (local paths, tarballs) fail to resolve.

use crate::core::forge::{
    Forge, RepoInfo, CODEBERG_HOST, GITEA_HOST, GITHUB_HOST, GITLAB_HOST, SOURCEHUT_HOST,
};
use crate::core::input::{FlakeInput, InputKind};
use url::Url;

const GIT_SCHEMES: &[&str] = &["http", "https", "ssh", "git", "file"];

/// Resolve an input to its repository coordinates; `None` when there is no remote
pub fn resolve(input: &FlakeInput) -> Option<RepoInfo> {
    if matches!(input.kind, InputKind::Path | InputKind::Tarball) {
        return None;
    }

    if let (Some(owner), Some(repo)) = (non_empty(&input.owner), non_empty(&input.repo)) {
        if let Some(forge) = forge_for_kind(&input.kind, input.host.as_deref()) {
            return Some(RepoInfo::new(decode_owner(owner), repo, forge));
        }
        if let Some(host) = input.host.as_deref().or_else(|| remote_host(&input.url)) {
            if let Some(forge) = forge_for_host(host) {
                return Some(RepoInfo::new(decode_owner(owner), repo, forge));
            }
        }
    }

    let resolved = resolve_url(&input.url);
    if resolved.is_none() {
        log::debug!("Input '{}' has no resolvable remote: {}", input.name, input.url);
    }
    resolved
}

/// Parse a flake URL (short form, URL or SCP remote) into repository coordinates
pub fn resolve_url(url: &str) -> Option<RepoInfo> {
    let url = url.trim();
    if let Some(info) = resolve_short_form(url) {
        return Some(info);
    }

    let remote = Remote::parse(url)?;
    let forge = remote
        .host
        .as_deref()
        .and_then(forge_for_host)
        .filter(|_| remote.segments.len() >= 2);

    match forge {
        Some(forge @ Forge::GitLab { .. }) => {
            let (repo, groups) = remote.segments.split_last()?;
            Some(RepoInfo::new(groups.join("/"), repo.clone(), forge))
        }
        Some(forge) => Some(RepoInfo::new(
            strip_tilde(&remote.segments[0]),
            remote.segments[1].clone(),
            forge,
        )),
        None => {
            let mut tail = remote.segments.iter().rev();
            let repo = tail.next().cloned().unwrap_or_default();
            let owner = tail.next().map(|s| strip_tilde(s)).unwrap_or_default();
            Some(RepoInfo::new(
                owner,
                repo,
                Forge::Generic {
                    remote: url.to_string(),
                },
            ))
        }
    }
}

/// Map a host to a known forge, falling back to name heuristics
pub fn forge_for_host(host: &str) -> Option<Forge> {
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    match host {
        GITHUB_HOST => return Some(Forge::GitHub),
        GITLAB_HOST => return Some(Forge::GitLab { host: None }),
        SOURCEHUT_HOST => return Some(Forge::SourceHut { host: None }),
        CODEBERG_HOST => return Some(Forge::Codeberg),
        GITEA_HOST => {
            return Some(Forge::Gitea {
                host: GITEA_HOST.to_string(),
            })
        }
        _ => {}
    }

    if host.contains("gitlab") {
        Some(Forge::GitLab {
            host: Some(host.to_string()),
        })
    } else if host.contains("sr.ht") {
        Some(Forge::SourceHut {
            host: Some(host.to_string()),
        })
    } else if ["gitea", "forgejo", "gogs"].iter().any(|n| host.contains(n)) {
        Some(Forge::Gitea {
            host: host.to_string(),
        })
    } else {
        None
    }
}

fn forge_for_kind(kind: &InputKind, host: Option<&str>) -> Option<Forge> {
    let custom = |default: &str| {
        host.filter(|h| !h.eq_ignore_ascii_case(default))
            .map(str::to_string)
    };
    match kind {
        InputKind::GitHub => Some(Forge::GitHub),
        InputKind::GitLab => Some(Forge::GitLab {
            host: custom(GITLAB_HOST),
        }),
        InputKind::SourceHut => Some(Forge::SourceHut {
            host: custom(SOURCEHUT_HOST),
        }),
        _ => None,
    }
}

/// `github:owner/repo[/ref][?host=...]` and friends
fn resolve_short_form(url: &str) -> Option<RepoInfo> {
    let (scheme, rest) = url.split_once(':')?;
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    let host = query.and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "host")
            .map(|(_, value)| value.to_string())
    });

    let kind = match scheme {
        "github" => InputKind::GitHub,
        "gitlab" => InputKind::GitLab,
        "sourcehut" => InputKind::SourceHut,
        _ => return None,
    };
    let forge = forge_for_kind(&kind, host.as_deref())?;

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    Some(RepoInfo::new(decode_owner(owner), trim_git_suffix(repo), forge))
}

/// Owner without the SourceHut `~`, with GitLab's `%2F` subgroup separators decoded
fn decode_owner(owner: &str) -> String {
    strip_tilde(owner).replace("%2F", "/").replace("%2f", "/")
}

/// A git remote split into host and path segments
struct Remote {
    host: Option<String>,
    segments: Vec<String>,
}

impl Remote {
    fn parse(url: &str) -> Option<Self> {
        let plain = url.strip_prefix("git+").unwrap_or(url);

        if plain.contains("://") {
            let parsed = Url::parse(plain).ok()?;
            if !GIT_SCHEMES.contains(&parsed.scheme()) {
                return None;
            }
            // Plain file: URLs are tarballs or local trees, not git remotes
            if parsed.scheme() == "file" && !url.starts_with("git+") {
                return None;
            }
            return Some(Self {
                host: parsed.host_str().map(str::to_string),
                segments: path_segments(parsed.path()),
            });
        }

        // SCP style: [user@]host:path
        let (authority, path) = plain.split_once(':')?;
        if authority.is_empty() || authority.contains('/') || path.starts_with("//") {
            return None;
        }
        let host = authority.rsplit('@').next().unwrap_or(authority);
        if !host.contains('.') && !authority.contains('@') {
            return None;
        }
        Some(Self {
            host: Some(host.to_string()),
            segments: path_segments(path),
        })
    }
}

fn remote_host(url: &str) -> Option<&str> {
    let plain = url.strip_prefix("git+").unwrap_or(url);
    let (_, rest) = plain.split_once("://")?;
    let authority = rest.split(['/', '?']).next()?;
    let host = authority.rsplit('@').next()?;
    Some(host.split(':').next().unwrap_or(host))
}

fn path_segments(path: &str) -> Vec<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(trim_git_suffix)
        .collect()
}

fn trim_git_suffix(segment: &str) -> String {
    segment.strip_suffix(".git").unwrap_or(segment).to_string()
}

fn strip_tilde(owner: &str) -> String {
    owner.trim_start_matches('~').to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

//! Commit listings from hosted forge APIs.
//!
//! # Public API
//! - [`ForgeApi`]: Page through a repository's commits until the pinned revision shows up
//! - [`classify_response`]: Map an HTTP status to success or a [`HistoryError`]
//!
//! # Endpoints
//! - **GitHub**: `GET /repos/{owner}/{repo}/commits?sha=&per_page=&page=`, `Authorization: Bearer`
//! - **GitLab**: `GET /api/v4/projects/{owner%2Frepo}/repository/commits?ref_name=&per_page=&page=`,
//!   `PRIVATE-TOKEN`
//! - **Gitea / Codeberg**: `GET /api/v1/repos/{owner}/{repo}/commits?sha=&limit=&page=`,
//!   `Authorization: token`
//! - **SourceHut**: `GET /api/~{owner}/repos/{repo}/log[/{ref}]?start=`, cursor paging
//!
//! # Failures
//! 429, or 403 with a zero remaining-requests header, is a rate limit. 401/403 with
//! a token is an authentication failure. Both end the check. Any other failure is
//! reported as a non-terminal error so the caller can fall back to a local clone.

use crate::core::changelog::Traversal;
use crate::core::commit::{revision_matches, Commit};
use crate::core::config::{ApiTokens, EngineConfig};
use crate::core::error::HistoryError;
use crate::core::forge::{Forge, RepoInfo, GITHUB_HOST};
use crate::core::http::{HttpResponse, HttpTransport};
use crate::core::input::FlakeInput;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

const RATE_LIMIT_HEADERS: &[&str] = &["x-ratelimit-remaining", "ratelimit-remaining"];

pub struct ForgeApi {
    transport: Arc<dyn HttpTransport>,
    tokens: ApiTokens,
    config: EngineConfig,
    cancel: CancellationToken,
}

/// One page of commits plus the SourceHut continuation cursor
#[derive(Debug)]
struct Page {
    commits: Vec<Commit>,
    next: Option<String>,
}

impl ForgeApi {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: ApiTokens,
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            tokens,
            config,
            cancel,
        }
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
        if info.owner.is_empty() || info.repo.is_empty() {
            return Err(HistoryError::malformed(format!(
                "input '{}' lacks owner/repo for an API lookup",
                input.name
            )));
        }

        let token = self.tokens.for_forge(info.kind());
        let max_pages = self.config.max_pages(token.is_some()).max(1);
        let page_size = self.config.page_size.max(1);
        let reference = input.reference.as_deref();

        let mut ahead = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=max_pages {
            if page > 1 {
                self.pause().await?;
            }

            let url = page_url(info, reference, page, cursor.as_deref(), page_size)?;
            let response = self.get(url.as_str(), info, token).await?;
            let Page { mut commits, next } = parse_page(info, &response.body)?;
            let exhausted = match &info.forge {
                Forge::SourceHut { .. } => next.is_none(),
                _ => commits.len() < page_size,
            };

            if let Some(position) = commits
                .iter()
                .position(|commit| revision_matches(&commit.sha, &input.rev))
            {
                let mut behind = commits.split_off(position);
                behind.truncate(self.config.behind_limit.max(1));
                ahead.extend(commits);
                log::debug!(
                    "{}: pin found on page {page}, {} commits ahead",
                    input.name,
                    ahead.len()
                );
                return Ok(Traversal::Anchored { ahead, behind });
            }

            ahead.extend(commits);
            if exhausted {
                break;
            }
            cursor = next;
        }

        log::debug!(
            "{}: pin {} not seen in {} listed commits",
            input.name,
            input.short_rev(),
            ahead.len()
        );
        Ok(Traversal::Flat {
            commits: ahead,
            pinned: None,
        })
    }

    async fn pause(&self) -> Result<(), HistoryError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(HistoryError::Aborted),
            _ = tokio::time::sleep(self.config.page_delay()) => Ok(()),
        }
    }

    async fn get(
        &self,
        url: &str,
        info: &RepoInfo,
        token: Option<&str>,
    ) -> Result<HttpResponse, HistoryError> {
        if self.cancel.is_cancelled() {
            return Err(HistoryError::Aborted);
        }

        let headers = request_headers(&info.forge, token);
        log::debug!("GET {url}");
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(HistoryError::Aborted),
            response = self.transport.get(url, &headers) => response?,
        };

        classify_response(&response, info, token.is_some())?;
        Ok(response)
    }
}

/// Turn a non-success response into the matching error
pub fn classify_response(
    response: &HttpResponse,
    info: &RepoInfo,
    authenticated: bool,
) -> Result<(), HistoryError> {
    if response.is_success() {
        return Ok(());
    }

    let forge = info.kind().to_string();
    let exhausted = RATE_LIMIT_HEADERS
        .iter()
        .any(|name| response.header(name).map(str::trim) == Some("0"));

    match response.status {
        429 => Err(HistoryError::rate_limited(forge)),
        403 if exhausted => Err(HistoryError::rate_limited(forge)),
        401 | 403 if authenticated => Err(HistoryError::auth_failed(forge)),
        401 | 403 | 404 => Err(HistoryError::not_found(info.to_string())),
        status => Err(HistoryError::network(format!(
            "{forge} API returned HTTP {status}"
        ))),
    }
}

fn request_headers(forge: &Forge, token: Option<&str>) -> Vec<(String, String)> {
    let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
    if let Forge::GitHub = forge {
        headers[0].1 = "application/vnd.github+json".to_string();
    }
    if let Some(token) = token {
        let header = match forge {
            Forge::GitHub => ("Authorization".to_string(), format!("Bearer {token}")),
            Forge::GitLab { .. } => ("PRIVATE-TOKEN".to_string(), token.to_string()),
            _ => ("Authorization".to_string(), format!("token {token}")),
        };
        headers.push(header);
    }
    headers
}

fn page_url(
    info: &RepoInfo,
    reference: Option<&str>,
    page: usize,
    cursor: Option<&str>,
    page_size: usize,
) -> Result<Url, HistoryError> {
    let host = info.forge.host().unwrap_or(GITHUB_HOST);
    let (owner, repo) = (&info.owner, &info.repo);
    let (base, params): (String, Vec<(&str, String)>) = match &info.forge {
        Forge::GitHub => (
            format!("https://api.github.com/repos/{owner}/{repo}/commits"),
            paged("sha", reference, "per_page", page_size, page),
        ),
        Forge::GitLab { .. } => {
            let project: String =
                url::form_urlencoded::byte_serialize(format!("{owner}/{repo}").as_bytes())
                    .collect();
            (
                format!("https://{host}/api/v4/projects/{project}/repository/commits"),
                paged("ref_name", reference, "per_page", page_size, page),
            )
        }
        Forge::Codeberg | Forge::Gitea { .. } => {
            let mut params = paged("sha", reference, "limit", page_size, page);
            params.extend([
                ("stat", "false".to_string()),
                ("verification", "false".to_string()),
                ("files", "false".to_string()),
            ]);
            (
                format!("https://{host}/api/v1/repos/{owner}/{repo}/commits"),
                params,
            )
        }
        Forge::SourceHut { .. } => {
            let base = match reference {
                Some(reference) => {
                    format!("https://{host}/api/~{owner}/repos/{repo}/log/{reference}")
                }
                None => format!("https://{host}/api/~{owner}/repos/{repo}/log"),
            };
            let params = cursor
                .map(|start| vec![("start", start.to_string())])
                .unwrap_or_default();
            (base, params)
        }
        Forge::Generic { remote } => {
            return Err(HistoryError::malformed(format!(
                "no commit API for {remote}"
            )))
        }
    };

    let mut url = Url::parse(&base).map_err(|e| HistoryError::malformed(e.to_string()))?;
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in &params {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

fn paged(
    ref_key: &'static str,
    reference: Option<&str>,
    size_key: &'static str,
    page_size: usize,
    page: usize,
) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(3);
    if let Some(reference) = reference {
        params.push((ref_key, reference.to_string()));
    }
    params.push((size_key, page_size.to_string()));
    params.push(("page", page.to_string()));
    params
}

#[derive(Deserialize)]
struct GitHubCommit {
    sha: String,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    commit: GitHubCommitDetail,
}

#[derive(Deserialize, Default)]
struct GitHubCommitDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    author: Option<GitHubAuthor>,
}

#[derive(Deserialize)]
struct GitHubAuthor {
    #[serde(default)]
    name: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
struct GitLabCommit {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_name: String,
    #[serde(default)]
    authored_date: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
}

#[derive(Deserialize)]
struct SourceHutLog {
    #[serde(default)]
    next: Option<serde_json::Value>,
    #[serde(default)]
    results: Vec<SourceHutCommit>,
}

#[derive(Deserialize)]
struct SourceHutCommit {
    id: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    author: Option<SourceHutAuthor>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct SourceHutAuthor {
    #[serde(default)]
    name: String,
}

fn parse_page(info: &RepoInfo, body: &str) -> Result<Page, HistoryError> {
    let malformed = |e: serde_json::Error| {
        HistoryError::malformed(format!("unexpected {} response: {e}", info.kind()))
    };

    let (commits, next): (Vec<Commit>, Option<String>) = match &info.forge {
        Forge::GitLab { .. } => {
            let raw: Vec<GitLabCommit> = serde_json::from_str(body).map_err(malformed)?;
            let commits = raw
                .into_iter()
                .map(|c| {
                    let date = parse_date(c.authored_date.as_deref());
                    let mut commit = Commit::new(c.id, &c.title, c.author_name, date);
                    commit.web_url = c.web_url;
                    commit
                })
                .collect();
            (commits, None)
        }
        Forge::SourceHut { .. } => {
            let raw: SourceHutLog = serde_json::from_str(body).map_err(malformed)?;
            let commits = raw
                .results
                .into_iter()
                .map(|c| {
                    let date = parse_date(c.timestamp.as_deref());
                    let author = c.author.map(|a| a.name).unwrap_or_default();
                    Commit::new(c.id, &c.message, author, date)
                })
                .collect();
            let next = raw.next.and_then(|value| match value {
                serde_json::Value::String(s) if !s.is_empty() => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            (commits, next)
        }
        _ => {
            let raw: Vec<GitHubCommit> = serde_json::from_str(body).map_err(malformed)?;
            let commits = raw
                .into_iter()
                .map(|c| {
                    let (author, date) = match c.commit.author {
                        Some(author) => (author.name, parse_date(author.date.as_deref())),
                        None => (String::new(), DateTime::<Utc>::default()),
                    };
                    let mut commit = Commit::new(c.sha, &c.commit.message, author, date);
                    commit.web_url = c.html_url;
                    commit
                })
                .collect();
            (commits, None)
        }
    };

    let commits = commits
        .into_iter()
        .map(|mut commit| {
            if commit.web_url.is_none() {
                commit.web_url = info.commit_url(&commit.sha);
            }
            commit
        })
        .collect();
    Ok(Page { commits, next })
}

fn parse_date(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github() -> RepoInfo {
        RepoInfo::new("NixOS", "nixpkgs", Forge::GitHub)
    }

    #[test]
    fn test_github_page_url() {
        let url = page_url(&github(), Some("nixos-unstable"), 2, None, 100).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/NixOS/nixpkgs/commits?sha=nixos-unstable&per_page=100&page=2"
        );
    }

    #[test]
    fn test_gitlab_page_url_encodes_project() {
        let info = RepoInfo::new(
            "group/sub",
            "proj",
            Forge::GitLab {
                host: Some("gitlab.gnome.org".to_string()),
            },
        );
        let url = page_url(&info, None, 1, None, 50).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.gnome.org/api/v4/projects/group%2Fsub%2Fproj/repository/commits?per_page=50&page=1"
        );
    }

    #[test]
    fn test_sourcehut_page_url_uses_cursor() {
        let info = RepoInfo::new("sircmpwn", "hare", Forge::SourceHut { host: None });
        let url = page_url(&info, Some("master"), 2, Some("abc123"), 100).unwrap();
        assert_eq!(
            url.as_str(),
            "https://git.sr.ht/api/~sircmpwn/repos/hare/log/master?start=abc123"
        );
    }

    #[test]
    fn test_generic_has_no_page_url() {
        let info = RepoInfo::new(
            "o",
            "r",
            Forge::Generic {
                remote: "file:///x".to_string(),
            },
        );
        assert!(page_url(&info, None, 1, None, 10).is_err());
    }

    #[test]
    fn test_request_headers_per_forge() {
        let headers = request_headers(&Forge::GitHub, Some("t"));
        assert!(headers.contains(&("Authorization".to_string(), "Bearer t".to_string())));

        let headers = request_headers(&Forge::GitLab { host: None }, Some("t"));
        assert!(headers.contains(&("PRIVATE-TOKEN".to_string(), "t".to_string())));

        let headers = request_headers(&Forge::Codeberg, Some("t"));
        assert!(headers.contains(&("Authorization".to_string(), "token t".to_string())));

        assert_eq!(request_headers(&Forge::Codeberg, None).len(), 1);
    }

    #[test]
    fn test_classify_response() {
        let info = github();
        let limited = HttpResponse::new(403, "").with_header("X-RateLimit-Remaining", "0");
        assert_eq!(
            classify_response(&limited, &info, false),
            Err(HistoryError::rate_limited("GitHub"))
        );
        assert_eq!(
            classify_response(&HttpResponse::new(429, ""), &info, true),
            Err(HistoryError::rate_limited("GitHub"))
        );
        assert_eq!(
            classify_response(&HttpResponse::new(401, ""), &info, true),
            Err(HistoryError::auth_failed("GitHub"))
        );
        assert!(matches!(
            classify_response(&HttpResponse::new(404, ""), &info, false),
            Err(HistoryError::NotFound { .. })
        ));
        assert!(matches!(
            classify_response(&HttpResponse::new(502, ""), &info, false),
            Err(HistoryError::Network { .. })
        ));
        assert!(classify_response(&HttpResponse::new(200, "[]"), &info, false).is_ok());
    }

    #[test]
    fn test_parse_github_page() {
        let body = r#"[{"sha":"abc","html_url":"https://github.com/NixOS/nixpkgs/commit/abc",
            "commit":{"message":"subject\n\nbody","author":{"name":"Eelco","date":"2024-05-01T10:00:00Z"}}}]"#;
        let page = parse_page(&github(), body).unwrap();
        assert_eq!(page.commits.len(), 1);
        assert_eq!(page.commits[0].message, "subject");
        assert_eq!(page.commits[0].author, "Eelco");
        assert!(page.next.is_none());
    }

    #[test]
    fn test_parse_gitlab_page_fills_missing_web_url() {
        let info = RepoInfo::new("o", "r", Forge::GitLab { host: None });
        let body = r#"[{"id":"abc","title":"t","author_name":"A","authored_date":"2024-05-01T10:00:00.000+02:00"}]"#;
        let page = parse_page(&info, body).unwrap();
        assert_eq!(
            page.commits[0].web_url.as_deref(),
            Some("https://gitlab.com/o/r/-/commit/abc")
        );
    }

    #[test]
    fn test_parse_sourcehut_page() {
        let info = RepoInfo::new("o", "r", Forge::SourceHut { host: None });
        let body = r#"{"next":"def","results":[{"id":"abc","message":"m\n","author":{"name":"D"},"timestamp":"2024-01-01T00:00:00Z"}],"total":2}"#;
        let page = parse_page(&info, body).unwrap();
        assert_eq!(page.next.as_deref(), Some("def"));
        assert_eq!(page.commits[0].author, "D");
    }

    #[test]
    fn test_parse_page_rejects_unexpected_shape() {
        let err = parse_page(&github(), r#"{"message":"Not Found"}"#).unwrap_err();
        assert!(matches!(err, HistoryError::MalformedInput { .. }));
    }
}

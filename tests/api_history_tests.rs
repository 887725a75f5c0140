use flake_navigator::core::aggregator::{SweepOutcome, UpdateChecker, UpdateStatus};
use flake_navigator::core::cache::CloneCache;
use flake_navigator::core::changelog::Traversal;
use flake_navigator::core::config::ApiTokens;
use flake_navigator::core::git::LocalHistory;
use flake_navigator::core::history::{CommitHistory, HistoryService};
use flake_navigator::core::http::HttpResponse;
use flake_navigator::core::process::CommandRunner;
use flake_navigator::core::resolver::resolve;
use flake_navigator::core::{FlakeInput, HistoryError, InputKind};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

mod common;
use common::{fixtures::*, repository::*};

fn nixpkgs_pinned_at(rev: &str) -> FlakeInput {
    FlakeInput::new("nixpkgs", InputKind::GitHub, "github:NixOS/nixpkgs")
        .with_repo("NixOS", "nixpkgs")
        .with_rev(rev)
}

fn offline_local(cache_root: &TempDir) -> LocalHistory {
    let runner = CommandRunner::new(CancellationToken::new(), Duration::from_secs(30));
    LocalHistory::new(
        Arc::new(CloneCache::new(cache_root.path(), runner.clone())),
        runner,
        test_config(),
    )
}

#[cfg(test)]
mod api_history_tests {
    use super::*;

    #[tokio::test]
    async fn test_five_newer_commits_then_pin_is_five_behind() -> anyhow::Result<()> {
        let mut shas: Vec<String> = (1..=5).map(sha).collect();
        shas.push("deadbeef".to_string());
        shas.extend((10..13).map(sha));
        let transport = Arc::new(
            ScriptedTransport::new().route("api.github.com", vec![HttpResponse::new(200, github_page(&shas))]),
        );

        let cache_root = TempDir::new()?;
        let service = HistoryService::new(
            forge_api(Arc::clone(&transport), ApiTokens::default()),
            offline_local(&cache_root),
        );
        let checker = UpdateChecker::new(Arc::new(service), 3, CancellationToken::new());

        let inputs = vec![nixpkgs_pinned_at("deadbeef")];
        let outcome = checker.check_all(&inputs, |_, _| {}).await;
        let SweepOutcome::Completed(statuses) = outcome else {
            panic!("sweep should complete");
        };
        assert_eq!(statuses["nixpkgs"], UpdateStatus::Done { commits_behind: 5 });

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("https://api.github.com/repos/NixOS/nixpkgs/commits?"));
        Ok(())
    }

    #[tokio::test]
    async fn test_changelog_marks_pin_and_keeps_older_commits() -> anyhow::Result<()> {
        let mut shas: Vec<String> = (1..=2).map(sha).collect();
        shas.push(sha(500));
        shas.extend((20..24).map(sha));
        let transport = Arc::new(
            ScriptedTransport::new().route("api.github.com", vec![HttpResponse::new(200, github_page(&shas))]),
        );

        let cache_root = TempDir::new()?;
        let service = HistoryService::new(
            forge_api(transport, ApiTokens::default()),
            offline_local(&cache_root),
        );
        let input = nixpkgs_pinned_at(&sha(500));
        let info = resolve(&input).expect("github input");

        let changelog = service.changelog(&input, &info).await?;
        assert_eq!(changelog.pinned_index, Some(2));
        assert!(changelog.commits[2].is_pinned);
        assert_eq!(changelog.commits.len(), 7);
        assert_eq!(changelog.commits[0].message, "commit 0");
        assert!(changelog.commits[0]
            .web_url
            .as_deref()
            .is_some_and(|url| url.contains(&sha(1))));
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_rate_limit_is_reported() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new().route(
            "api.github.com",
            vec![HttpResponse::new(403, r#"{"message":"API rate limit exceeded"}"#)
                .with_header("X-RateLimit-Remaining", "0")],
        ));

        let cache_root = TempDir::new()?;
        let service = HistoryService::new(
            forge_api(transport, ApiTokens::default()),
            offline_local(&cache_root),
        );
        let checker = UpdateChecker::new(Arc::new(service), 3, CancellationToken::new());

        let outcome = checker
            .check_all(&[nixpkgs_pinned_at("deadbeef")], |_, _| {})
            .await;
        let SweepOutcome::Completed(statuses) = outcome else {
            panic!("sweep should complete");
        };
        assert!(matches!(
            statuses["nixpkgs"],
            UpdateStatus::Failed(HistoryError::RateLimited { .. })
        ));
        // Rate limits never fall back to cloning
        assert!(std::fs::read_dir(cache_root.path())?.next().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_token_is_auth_failure() -> anyhow::Result<()> {
        let transport = Arc::new(
            ScriptedTransport::new().route("api.github.com", vec![HttpResponse::new(401, "{}")]),
        );
        let tokens = ApiTokens {
            github: Some("secret".to_string()),
            ..ApiTokens::default()
        };
        let api = forge_api(Arc::clone(&transport), tokens);
        let input = nixpkgs_pinned_at("deadbeef");
        let info = resolve(&input).expect("github input");

        let err = api.traverse(&input, &info).await.expect_err("401 with token");
        assert!(matches!(err, HistoryError::AuthFailed { .. }));
        assert!(transport
            .headers_of(0)
            .contains(&("Authorization".to_string(), "Bearer secret".to_string())));
        Ok(())
    }

    #[tokio::test]
    async fn test_paging_stops_at_short_page() -> anyhow::Result<()> {
        // Page size is 10: one full page, then a short one without the pin
        let full: Vec<String> = (1..=10).map(sha).collect();
        let short: Vec<String> = (11..=13).map(sha).collect();
        let transport = Arc::new(ScriptedTransport::new().route(
            "api.github.com",
            vec![
                HttpResponse::new(200, github_page(&full)),
                HttpResponse::new(200, github_page(&short)),
            ],
        ));
        let api = forge_api(Arc::clone(&transport), ApiTokens::default());
        let input = nixpkgs_pinned_at(&sha(999));
        let info = resolve(&input).expect("github input");

        let traversal = api.traverse(&input, &info).await?;
        assert!(matches!(traversal, Traversal::Flat { pinned: None, .. }));
        assert_eq!(traversal.commits_since().len(), 13);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].contains("page=2"));
        Ok(())
    }

    #[tokio::test]
    async fn test_anonymous_paging_respects_page_budget() -> anyhow::Result<()> {
        let full: Vec<String> = (1..=10).map(sha).collect();
        let transport = Arc::new(
            ScriptedTransport::new().route("api.github.com", vec![HttpResponse::new(200, github_page(&full))]),
        );
        let api = forge_api(Arc::clone(&transport), ApiTokens::default());
        let input = nixpkgs_pinned_at(&sha(999));
        let info = resolve(&input).expect("github input");

        api.traverse(&input, &info).await?;
        assert_eq!(transport.requests().len(), test_config().max_pages_anonymous);
        Ok(())
    }

    #[tokio::test]
    async fn test_api_not_found_falls_back_to_clone() -> anyhow::Result<()> {
        let upstream = setup_upstream_repo()?;
        let pin = upstream.commit("pinned")?;
        upstream.commits("newer", 3)?;

        // Point the GitHub clone URL at the fixture so the fallback stays offline
        std::env::set_var("GIT_CONFIG_COUNT", "1");
        std::env::set_var(
            "GIT_CONFIG_KEY_0",
            format!("url.file://{}.insteadOf", upstream.path().display()),
        );
        std::env::set_var("GIT_CONFIG_VALUE_0", "https://github.com/owner/private.git");

        let transport = Arc::new(
            ScriptedTransport::new().route("api.github.com", vec![HttpResponse::new(404, "{}")]),
        );
        let cache_root = TempDir::new()?;
        let service = HistoryService::new(
            forge_api(Arc::clone(&transport), ApiTokens::default()),
            offline_local(&cache_root),
        );

        let input = FlakeInput::new("private", InputKind::GitHub, "github:owner/private")
            .with_repo("owner", "private")
            .with_rev(&pin);
        let info = resolve(&input).expect("github input");
        assert!(info.forge.has_api());

        assert_eq!(service.commits_since(&input, &info).await?.len(), 3);
        assert_eq!(transport.requests().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_generic_remote_skips_api() -> anyhow::Result<()> {
        let upstream = setup_upstream_repo()?;
        let pin = upstream.commit("pinned")?;
        upstream.commits("newer", 2)?;

        let transport = Arc::new(ScriptedTransport::new());
        let cache_root = TempDir::new()?;
        let service = HistoryService::new(
            forge_api(Arc::clone(&transport), ApiTokens::default()),
            offline_local(&cache_root),
        );

        let input = upstream.input("dep", &pin);
        let info = resolve(&input).expect("resolvable");
        assert_eq!(service.commits_since(&input, &info).await?.len(), 2);
        assert!(transport.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_api_lookup_is_aborted() -> anyhow::Result<()> {
        let transport = Arc::new(
            ScriptedTransport::new().route("api.github.com", vec![HttpResponse::new(200, "[]")]),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let api = flake_navigator::core::forge_api::ForgeApi::new(
            transport.clone(),
            ApiTokens::default(),
            test_config(),
            cancel,
        );
        let input = nixpkgs_pinned_at("deadbeef");
        let info = resolve(&input).expect("github input");

        let err = api.traverse(&input, &info).await.expect_err("cancelled");
        assert_eq!(err, HistoryError::Aborted);
        assert!(transport.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_api_error_reported_when_clone_also_fails() -> anyhow::Result<()> {
        let host = "gitlab.example.invalid";
        let transport = Arc::new(
            ScriptedTransport::new().route(host, vec![HttpResponse::new(502, "bad gateway")]),
        );
        let cache_root = TempDir::new()?;
        let service = HistoryService::new(
            forge_api(Arc::clone(&transport), ApiTokens::default()),
            offline_local(&cache_root),
        );

        let input = FlakeInput::new("tool", InputKind::GitLab, format!("gitlab:team/tool?host={host}"))
            .with_repo("team", "tool")
            .with_host(host)
            .with_rev(sha(1));
        let info = resolve(&input).expect("gitlab input");

        let err = service
            .commits_since(&input, &info)
            .await
            .expect_err("neither the API nor the clone answers");
        assert!(
            matches!(&err, HistoryError::Network { message } if message.contains("HTTP 502")),
            "{err}"
        );
        assert_eq!(transport.requests().len(), 1);
        // The failed clone leaves nothing behind
        assert!(std::fs::read_dir(cache_root.path())?.next().is_none());
        Ok(())
    }
}

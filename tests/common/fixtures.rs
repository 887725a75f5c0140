//! Scripted fakes for the engine's seams
//!
//! Provides stand-ins for the HTTP transport, the commit history and the `nix`
//! tool so engine and browser behaviour can be tested without a network or a
//! Nix installation.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use flake_navigator::core::commit::{ChangelogResult, Commit};
use flake_navigator::core::config::{ApiTokens, EngineConfig};
use flake_navigator::core::error::{FlakeNavigatorError, HistoryError, Result};
use flake_navigator::core::forge::RepoInfo;
use flake_navigator::core::forge_api::ForgeApi;
use flake_navigator::core::history::CommitHistory;
use flake_navigator::core::http::{HttpResponse, HttpTransport};
use flake_navigator::core::input::{Flake, FlakeInput, InputKind};
use flake_navigator::core::nix::NixOperations;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Engine settings for tests: no pacing, small pages
pub fn test_config() -> EngineConfig {
    EngineConfig {
        page_size: 10,
        page_delay_ms: 0,
        git_timeout_secs: 30,
        ..EngineConfig::default()
    }
}

/// SHA-like hex string derived from `seed`
pub fn sha(seed: usize) -> String {
    format!("{seed:040x}")
}

/// A GitHub commits page listing `shas` newest first
pub fn github_page(shas: &[String]) -> String {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap_or_default();
    let entries: Vec<serde_json::Value> = shas
        .iter()
        .enumerate()
        .map(|(i, sha)| {
            let date = start - ChronoDuration::hours(i as i64);
            serde_json::json!({
                "sha": sha,
                "html_url": format!("https://github.com/o/r/commit/{sha}"),
                "commit": {
                    "message": format!("commit {i}\n\nbody"),
                    "author": { "name": "Dev", "date": date.to_rfc3339() }
                }
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

/// HTTP transport answering from a script of `(url fragment, responses)`
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<HttpResponse>)>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose URL contains `fragment`, one response per request;
    /// the last response repeats
    pub fn route(self, fragment: &str, responses: Vec<HttpResponse>) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push((fragment.to_string(), responses.into()));
        }
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.iter().map(|(url, _)| url.clone()).collect())
            .unwrap_or_default()
    }

    pub fn headers_of(&self, index: usize) -> Vec<(String, String)> {
        self.requests
            .lock()
            .ok()
            .and_then(|requests| requests.get(index).map(|(_, headers)| headers.clone()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> std::result::Result<HttpResponse, HistoryError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((url.to_string(), headers.to_vec()));
        }
        let mut routes = self
            .routes
            .lock()
            .map_err(|_| HistoryError::network("poisoned script"))?;
        let Some((_, responses)) = routes.iter_mut().find(|(fragment, _)| url.contains(fragment.as_str())) else {
            return Ok(HttpResponse::new(404, "{}"));
        };
        match responses.len() {
            0 => Ok(HttpResponse::new(404, "{}")),
            1 => Ok(responses[0].clone()),
            _ => Ok(responses.pop_front().unwrap_or_else(|| HttpResponse::new(404, "{}"))),
        }
    }
}

pub fn forge_api(transport: Arc<ScriptedTransport>, tokens: ApiTokens) -> ForgeApi {
    ForgeApi::new(transport, tokens, test_config(), CancellationToken::new())
}

/// Commit history with canned answers per input and concurrency tracking
pub struct FakeHistory {
    results: HashMap<String, std::result::Result<Vec<Commit>, HistoryError>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            delay: Duration::from_millis(20),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// `name` is `behind` commits behind
    pub fn behind(mut self, name: &str, behind: usize) -> Self {
        let commits = (0..behind)
            .map(|i| Commit::new(sha(i + 1), &format!("change {i}"), "Dev", Utc::now()))
            .collect();
        self.results.insert(name.to_string(), Ok(commits));
        self
    }

    pub fn failing(mut self, name: &str, error: HistoryError) -> Self {
        self.results.insert(name.to_string(), Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitHistory for FakeHistory {
    async fn commits_since(
        &self,
        input: &FlakeInput,
        _info: &RepoInfo,
    ) -> std::result::Result<Vec<Commit>, HistoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.results
            .get(&input.name)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn changelog(
        &self,
        input: &FlakeInput,
        info: &RepoInfo,
    ) -> std::result::Result<ChangelogResult, HistoryError> {
        let mut commits = self.commits_since(input, info).await?;
        let pinned_index = commits.len();
        let mut pinned = Commit::new(input.rev.clone(), "pinned", "Dev", Utc::now());
        pinned.is_pinned = true;
        commits.push(pinned);
        Ok(ChangelogResult {
            commits,
            pinned_index: Some(pinned_index),
        })
    }
}

/// A GitHub input named `name`
pub fn github_input(name: &str) -> FlakeInput {
    FlakeInput::new(name, InputKind::GitHub, format!("github:owner/{name}"))
        .with_repo("owner", name)
        .with_rev(sha(1000))
}

pub fn sample_flake(names: &[&str]) -> Flake {
    let mut inputs: Vec<FlakeInput> = names.iter().map(|name| github_input(name)).collect();
    inputs.push(FlakeInput::new("local", InputKind::Path, "path:./local"));
    Flake::new(PathBuf::from("/flake"), Some("test flake".to_string()), inputs)
}

/// Recorded `nix` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NixCall {
    Load,
    Update(Vec<String>),
    UpdateAll,
    Lock { name: String, url: String },
}

/// `nix` stand-in serving a fixed flake
pub struct FakeNix {
    flake: Mutex<std::result::Result<Flake, String>>,
    calls: Mutex<Vec<NixCall>>,
    fail_lock: bool,
}

impl FakeNix {
    pub fn new(flake: Flake) -> Self {
        Self {
            flake: Mutex::new(Ok(flake)),
            calls: Mutex::new(Vec::new()),
            fail_lock: false,
        }
    }

    pub fn broken(message: &str) -> Self {
        Self {
            flake: Mutex::new(Err(message.to_string())),
            calls: Mutex::new(Vec::new()),
            fail_lock: false,
        }
    }

    pub fn failing_lock(mut self) -> Self {
        self.fail_lock = true;
        self
    }

    pub fn set_flake(&self, flake: Flake) {
        if let Ok(mut current) = self.flake.lock() {
            *current = Ok(flake);
        }
    }

    pub fn calls(&self) -> Vec<NixCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, call: NixCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl NixOperations for FakeNix {
    async fn load_metadata(&self, _path: &Path) -> Result<Flake> {
        self.record(NixCall::Load);
        let flake = self
            .flake
            .lock()
            .map_err(|_| FlakeNavigatorError::metadata_parse("poisoned"))?
            .clone();
        flake.map_err(FlakeNavigatorError::metadata_parse)
    }

    async fn update_inputs(&self, _path: &Path, names: &[String]) -> Result<()> {
        self.record(NixCall::Update(names.to_vec()));
        Ok(())
    }

    async fn update_all(&self, _path: &Path) -> Result<()> {
        self.record(NixCall::UpdateAll);
        Ok(())
    }

    async fn lock_input(&self, _path: &Path, name: &str, override_url: &str) -> Result<()> {
        self.record(NixCall::Lock {
            name: name.to_string(),
            url: override_url.to_string(),
        });
        if self.fail_lock {
            return Err(FlakeNavigatorError::tool_failed("nix flake update", "lock refused"));
        }
        Ok(())
    }
}

//! The interactive flake-input browser.
//!
//! # Public API
//! - [`App`]: Owns the view state and runs every engine operation in the background
//! - [`Services`]: The engine objects the browser drives
//! - [`TaskResult`]: Messages background tasks send back to the UI loop
//!
//! # Event flow
//! Key presses go through the pure [`handler::handle_key`], which returns an
//! [`Action`]. [`App::perform`] spawns the matching tokio task; each task reports
//! back over an unbounded channel, and [`App::handle_task`] folds the result into
//! the state. Nothing on the UI side ever awaits engine work directly.

pub mod event;
pub mod handler;
pub mod render;
pub mod state;
pub mod terminal;

pub use handler::{handle_key, Action};
pub use state::{AppState, ChangelogLoad, ChangelogView, ConfirmOverlay, ListView, StateKind};
pub use terminal::Tui;

use crate::core::aggregator::{SweepOutcome, UpdateChecker, UpdateStatus};
use crate::core::commit::ChangelogResult;
use crate::core::config::{ApiTokens, EngineConfig};
use crate::core::error::{HistoryError, Result};
use crate::core::history::{CommitHistory, HistoryService};
use crate::core::input::Flake;
use crate::core::nix::{NixCli, NixOperations};
use crate::core::process::CommandRunner;
use crate::core::status::StatusMessage;
use crossterm::event::KeyEvent;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// Key polling interval; also drives the spinner
pub const TICK_RATE: Duration = Duration::from_millis(16);

#[derive(Clone)]
pub struct Services {
    pub nix: Arc<dyn NixOperations>,
    pub history: Arc<dyn CommitHistory>,
    pub checker: Arc<UpdateChecker>,
}

impl Services {
    /// Production wiring; every component shares `cancel`
    pub fn with_defaults(
        config: &EngineConfig,
        tokens: ApiTokens,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let batch_size = config.batch_size(tokens.is_authenticated());
        let history: Arc<dyn CommitHistory> = Arc::new(HistoryService::with_defaults(
            config,
            tokens,
            cancel.clone(),
        )?);
        let checker = Arc::new(UpdateChecker::new(
            Arc::clone(&history),
            batch_size,
            cancel.clone(),
        ));
        let nix = Arc::new(NixCli::new(CommandRunner::new(cancel, config.nix_timeout())));
        Ok(Self {
            nix,
            history,
            checker,
        })
    }
}

#[derive(Debug)]
pub enum TaskResult {
    FlakeLoaded(std::result::Result<Flake, String>),
    InputStatus {
        name: String,
        status: UpdateStatus,
    },
    SweepFinished(SweepOutcome),
    ChangelogLoaded {
        request_id: u64,
        result: std::result::Result<ChangelogResult, HistoryError>,
    },
    UpdateFinished(std::result::Result<(), String>),
    LockFinished {
        name: String,
        lock_url: String,
        result: std::result::Result<(), String>,
    },
}

pub struct App {
    state: AppState,
    flake_path: PathBuf,
    services: Services,
    cancel: CancellationToken,
    tx: UnboundedSender<TaskResult>,
    rx: UnboundedReceiver<TaskResult>,
    next_request_id: u64,
    message: Option<StatusMessage>,
    tick: usize,
}

impl App {
    pub fn new(flake_path: PathBuf, services: Services, cancel: CancellationToken) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            state: AppState::Loading,
            flake_path,
            services,
            cancel,
            tx,
            rx,
            next_request_id: 0,
            message: None,
            tick: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn message(&self) -> Option<&StatusMessage> {
        self.message.as_ref()
    }

    pub fn flake_path(&self) -> &std::path::Path {
        &self.flake_path
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn is_checking(&self) -> bool {
        self.services.checker.is_checking()
    }

    pub fn should_quit(&self) -> bool {
        matches!(self.state, AppState::Quitting)
    }

    /// Kick off the initial metadata load
    pub fn start(&mut self) {
        self.state = AppState::Loading;
        self.spawn_load();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let action = handle_key(&mut self.state, key);
        self.perform(action);
    }

    pub fn perform(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Quit => {
                log::debug!("Quit requested, cancelling outstanding work");
                self.state = AppState::Quitting;
                self.cancel.cancel();
            }
            Action::Warn(text) => self.message = Some(StatusMessage::warning(text)),
            Action::Refresh => {
                self.message = Some(StatusMessage::info("Refreshing"));
                self.spawn_load();
            }
            Action::UpdateSelected(names) => {
                self.message = Some(StatusMessage::info(format!("Updating {}", names.join(", "))));
                let nix = Arc::clone(&self.services.nix);
                let path = self.flake_path.clone();
                self.spawn(async move {
                    let result = nix.update_inputs(&path, &names).await;
                    TaskResult::UpdateFinished(result.map_err(|e| e.to_string()))
                });
            }
            Action::UpdateAll => {
                self.message = Some(StatusMessage::info("Updating all inputs"));
                let nix = Arc::clone(&self.services.nix);
                let path = self.flake_path.clone();
                self.spawn(async move {
                    let result = nix.update_all(&path).await;
                    TaskResult::UpdateFinished(result.map_err(|e| e.to_string()))
                });
            }
            Action::OpenChangelog => self.spawn_changelog(),
            Action::ConfirmLock { name, lock_url } => {
                log::debug!("Locking {name} to {lock_url}");
                let nix = Arc::clone(&self.services.nix);
                let path = self.flake_path.clone();
                self.spawn(async move {
                    let result = nix.lock_input(&path, &name, &lock_url).await;
                    TaskResult::LockFinished {
                        name,
                        lock_url,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
        }
    }

    pub fn handle_task(&mut self, task: TaskResult) {
        if self.should_quit() {
            return;
        }
        match task {
            TaskResult::FlakeLoaded(result) => self.on_flake_loaded(result),
            TaskResult::InputStatus { name, status } => {
                if let Some(list) = self.state.list_mut() {
                    list.apply_status(&name, status);
                }
            }
            TaskResult::SweepFinished(outcome) => self.on_sweep_finished(outcome),
            TaskResult::ChangelogLoaded { request_id, result } => {
                self.on_changelog_loaded(request_id, result)
            }
            TaskResult::UpdateFinished(result) => match result {
                Ok(()) => {
                    self.message = Some(StatusMessage::success("Lock file updated"));
                    self.spawn_load();
                }
                Err(err) => {
                    if let Some(list) = self.state.list_mut() {
                        list.busy = false;
                    }
                    self.message = Some(StatusMessage::error(format!("Update failed: {err}")));
                }
            },
            TaskResult::LockFinished {
                name,
                lock_url,
                result,
            } => self.on_lock_finished(name, lock_url, result),
        }
    }

    /// Apply every result that has already arrived
    pub fn drain_tasks(&mut self) {
        while let Ok(task) = self.rx.try_recv() {
            self.handle_task(task);
        }
    }

    /// Wait for the next background result and apply it
    pub async fn process_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                self.handle_task(task);
                true
            }
            None => false,
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.tick = self.tick.wrapping_add(1);
        if self.message.as_ref().is_some_and(|m| m.is_expired(now)) {
            self.message = None;
        }
    }

    /// Draw, poll keys and apply background results until the user quits
    pub async fn run(&mut self, tui: &mut Tui) -> Result<()> {
        self.start();
        loop {
            self.drain_tasks();
            self.on_tick(Instant::now());
            tui.draw(|frame| render::draw(frame, self))?;
            if self.should_quit() {
                return Ok(());
            }
            if let Some(key) = event::poll_key(TICK_RATE)? {
                self.handle_key(key);
            }
            tokio::task::yield_now().await;
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = TaskResult> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return;
        }
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // The receiver is gone once the app has shut down
            let _ = tx.send(task.await);
        });
    }

    fn spawn_load(&self) {
        let nix = Arc::clone(&self.services.nix);
        let path = self.flake_path.clone();
        self.spawn(async move {
            TaskResult::FlakeLoaded(nix.load_metadata(&path).await.map_err(|e| e.to_string()))
        });
    }

    fn spawn_sweep(&self, flake: &Flake) {
        if self.cancel.is_cancelled() {
            return;
        }
        let checker = Arc::clone(&self.services.checker);
        let inputs = flake.inputs.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = checker
                .check_all(&inputs, |name, status| {
                    let _ = tx.send(TaskResult::InputStatus {
                        name: name.to_string(),
                        status: status.clone(),
                    });
                })
                .await;
            let _ = tx.send(TaskResult::SweepFinished(outcome));
        });
    }

    fn spawn_changelog(&mut self) {
        let AppState::Changelog(view) = &mut self.state else {
            return;
        };
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        view.load = ChangelogLoad::Pending { request_id };

        let history = Arc::clone(&self.services.history);
        let input = view.input.clone();
        let info = view.info.clone();
        log::debug!("Loading changelog #{request_id} for {}", input.name);
        self.spawn(async move {
            let result = history.changelog(&input, &info).await;
            TaskResult::ChangelogLoaded { request_id, result }
        });
    }

    fn on_flake_loaded(&mut self, result: std::result::Result<Flake, String>) {
        let flake = match result {
            Ok(flake) => flake,
            Err(err) => {
                if let Some(list) = self.state.list_mut() {
                    list.busy = false;
                    self.message = Some(StatusMessage::error(err));
                    return;
                }
                self.state = AppState::Error(err);
                return;
            }
        };

        log::debug!("Loaded {} inputs from {}", flake.inputs.len(), flake.path.display());
        self.spawn_sweep(&flake);
        if let Some(list) = self.state.list_mut() {
            list.replace_flake(flake);
            return;
        }
        self.state = AppState::List(ListView::new(flake));
    }

    fn on_sweep_finished(&mut self, outcome: SweepOutcome) {
        let statuses = match outcome {
            SweepOutcome::Completed(statuses) => statuses,
            SweepOutcome::Skipped => {
                log::debug!("Sweep skipped, one is already running");
                return;
            }
            SweepOutcome::Cancelled => return,
        };

        let limited = statuses.values().find_map(|status| match status {
            UpdateStatus::Failed(HistoryError::RateLimited { forge }) => Some(forge.clone()),
            _ => None,
        });
        if let Some(forge) = limited {
            self.message = Some(StatusMessage::warning(format!(
                "Rate limited by {forge}; set an API token to check more inputs"
            )));
        }
    }

    fn on_changelog_loaded(
        &mut self,
        request_id: u64,
        result: std::result::Result<ChangelogResult, HistoryError>,
    ) {
        let AppState::Changelog(view) = &mut self.state else {
            log::debug!("Discarding changelog #{request_id}, view closed");
            return;
        };
        if !view.is_waiting_for(request_id) {
            log::debug!("Discarding stale changelog #{request_id}");
            return;
        }
        match result {
            Ok(changelog) => view.set_ready(changelog),
            Err(err) => {
                view.set_ready(ChangelogResult::default());
                self.message = Some(StatusMessage::error(format!(
                    "Could not load history for {}: {err}",
                    view.input.name
                )));
            }
        }
    }

    fn on_lock_finished(
        &mut self,
        name: String,
        lock_url: String,
        result: std::result::Result<(), String>,
    ) {
        match result {
            Ok(()) => {
                self.message = Some(StatusMessage::success(format!("Locked {name} to {lock_url}")));
                if matches!(self.state, AppState::Changelog(_)) {
                    if let AppState::Changelog(view) =
                        std::mem::replace(&mut self.state, AppState::Loading)
                    {
                        self.state = AppState::List(view.parent);
                    }
                }
                // Stays busy until the reload replaces the metadata
                if let Some(list) = self.state.list_mut() {
                    list.busy = true;
                }
                self.spawn_load();
            }
            Err(err) => {
                if let AppState::Changelog(view) = &mut self.state {
                    view.overlay = None;
                    view.parent.busy = false;
                }
                self.message = Some(StatusMessage::error(format!("Lock failed: {err}")));
            }
        }
    }
}

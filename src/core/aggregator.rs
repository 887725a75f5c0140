//! Update-status sweeps over all inputs of a flake.
//!
//! # Public API
//! - [`UpdateChecker`]: Runs sweeps in fixed-size concurrent batches
//! - [`UpdateStatus`]: Per-input state reported while a sweep runs
//! - [`SweepOutcome`]: Final result of a sweep request
//!
//! # Ordering
//! Every resolvable input is reported as [`UpdateStatus::Loading`] before any
//! check starts, then exactly once more with its terminal status. Inputs without
//! a remote are skipped silently. A batch is drained completely before the next
//! one starts, so at most `batch_size` checks are ever in flight.

use crate::core::error::HistoryError;
use crate::core::history::CommitHistory;
use crate::core::input::FlakeInput;
use crate::core::resolver::resolve;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Loading,
    Done { commits_behind: usize },
    Failed(HistoryError),
}

impl UpdateStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UpdateStatus::Loading)
    }

    /// Short label for list views
    pub fn label(&self) -> String {
        match self {
            UpdateStatus::Loading => "checking".to_string(),
            UpdateStatus::Done { commits_behind: 0 } => "up to date".to_string(),
            UpdateStatus::Done { commits_behind: 1 } => "1 commit behind".to_string(),
            UpdateStatus::Done { commits_behind } => format!("{commits_behind} commits behind"),
            UpdateStatus::Failed(HistoryError::RateLimited { .. }) => "rate limited".to_string(),
            UpdateStatus::Failed(HistoryError::Aborted) => "aborted".to_string(),
            UpdateStatus::Failed(_) => "error".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(HashMap<String, UpdateStatus>),
    /// Another sweep was already running
    Skipped,
    /// The cancellation token was set before the sweep started
    Cancelled,
}

pub struct UpdateChecker {
    history: Arc<dyn CommitHistory>,
    batch_size: usize,
    cancel: CancellationToken,
    checking: AtomicBool,
}

/// Clears the checking flag when the sweep ends, however it ends
struct CheckingGuard<'a>(&'a AtomicBool);

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl UpdateChecker {
    pub fn new(
        history: Arc<dyn CommitHistory>,
        batch_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            history,
            batch_size: batch_size.max(1),
            cancel,
            checking: AtomicBool::new(false),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::Acquire)
    }

    /// Check every input, reporting each status change through `on_status`
    pub async fn check_all<F>(&self, inputs: &[FlakeInput], mut on_status: F) -> SweepOutcome
    where
        F: FnMut(&str, &UpdateStatus),
    {
        if self.cancel.is_cancelled() {
            return SweepOutcome::Cancelled;
        }
        if self
            .checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Update sweep already running, skipping");
            return SweepOutcome::Skipped;
        }
        let _guard = CheckingGuard(&self.checking);

        let targets: Vec<_> = inputs
            .iter()
            .filter_map(|input| resolve(input).map(|info| (input, info)))
            .collect();
        log::debug!(
            "Checking {} of {} inputs in batches of {}",
            targets.len(),
            inputs.len(),
            self.batch_size
        );

        let mut statuses = HashMap::with_capacity(targets.len());
        for (input, _) in &targets {
            on_status(&input.name, &UpdateStatus::Loading);
            statuses.insert(input.name.clone(), UpdateStatus::Loading);
        }

        for batch in targets.chunks(self.batch_size) {
            if self.cancel.is_cancelled() {
                for (input, _) in batch {
                    let status = UpdateStatus::Failed(HistoryError::Aborted);
                    on_status(&input.name, &status);
                    statuses.insert(input.name.clone(), status);
                }
                continue;
            }

            let mut pending: FuturesUnordered<_> = batch
                .iter()
                .map(|&(input, ref info)| async move {
                    let status = tokio::select! {
                        _ = self.cancel.cancelled() => UpdateStatus::Failed(HistoryError::Aborted),
                        result = self.history.commits_since(input, info) => match result {
                            Ok(commits) => UpdateStatus::Done { commits_behind: commits.len() },
                            Err(err) => {
                                log::debug!("{}: update check failed: {err}", input.name);
                                UpdateStatus::Failed(err)
                            }
                        },
                    };
                    (input.name.as_str(), status)
                })
                .collect();

            while let Some((name, status)) = pending.next().await {
                on_status(name, &status);
                statuses.insert(name.to_string(), status);
            }
        }

        SweepOutcome::Completed(statuses)
    }
}

//! View states of the interactive browser.
//!
//! `Loading → {List, Error}`, `List ⇄ Changelog`, and inside the changelog an
//! optional confirm overlay. Views hold plain data only; side effects live in
//! [`crate::app::App`].

use crate::core::aggregator::UpdateStatus;
use crate::core::commit::{ChangelogResult, Commit};
use crate::core::forge::RepoInfo;
use crate::core::input::{Flake, FlakeInput};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug)]
pub enum AppState {
    Loading,
    Error(String),
    List(ListView),
    Changelog(ChangelogView),
    Quitting,
}

/// Field-less discriminant of [`AppState`], with the overlay as its own kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Loading,
    Error,
    List,
    Changelog,
    Confirm,
    Quitting,
}

impl AppState {
    pub fn kind(&self) -> StateKind {
        match self {
            AppState::Loading => StateKind::Loading,
            AppState::Error(_) => StateKind::Error,
            AppState::List(_) => StateKind::List,
            AppState::Changelog(view) if view.overlay.is_some() => StateKind::Confirm,
            AppState::Changelog(_) => StateKind::Changelog,
            AppState::Quitting => StateKind::Quitting,
        }
    }

    /// The list view, either current or kept behind an open changelog
    pub fn list_mut(&mut self) -> Option<&mut ListView> {
        match self {
            AppState::List(list) => Some(list),
            AppState::Changelog(view) => Some(&mut view.parent),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<&ListView> {
        match self {
            AppState::List(list) => Some(list),
            AppState::Changelog(view) => Some(&view.parent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListView {
    pub flake: Flake,
    pub cursor: usize,
    pub selected: BTreeSet<usize>,
    pub statuses: HashMap<String, UpdateStatus>,
    /// A `nix` operation started from this view is running
    pub busy: bool,
}

impl ListView {
    pub fn new(flake: Flake) -> Self {
        Self {
            flake,
            cursor: 0,
            selected: BTreeSet::new(),
            statuses: HashMap::new(),
            busy: false,
        }
    }

    pub fn len(&self) -> usize {
        self.flake.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flake.inputs.is_empty()
    }

    pub fn cursor_down(&mut self) {
        if self.cursor + 1 < self.len() {
            self.cursor += 1;
        }
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn toggle_selection(&mut self) {
        if !self.selected.remove(&self.cursor) {
            self.selected.insert(self.cursor);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn current(&self) -> Option<&FlakeInput> {
        self.flake.inputs.get(self.cursor)
    }

    pub fn selected_names(&self) -> Vec<String> {
        self.selected
            .iter()
            .filter_map(|&index| self.flake.inputs.get(index))
            .map(|input| input.name.clone())
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<&UpdateStatus> {
        self.statuses.get(name)
    }

    /// Record a status; later writes for the same name win
    pub fn apply_status(&mut self, name: &str, status: UpdateStatus) {
        self.statuses.insert(name.to_string(), status);
    }

    /// Swap in reloaded metadata, keeping the cursor and statuses that still apply
    pub fn replace_flake(&mut self, flake: Flake) {
        let names: Vec<String> = flake.inputs.iter().map(|i| i.name.clone()).collect();
        self.statuses.retain(|name, _| names.contains(name));
        self.flake = flake;
        self.cursor = self.cursor.min(self.len().saturating_sub(1));
        let len = self.len();
        self.selected.retain(|&index| index < len);
        self.busy = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangelogLoad {
    /// Waiting for the result tagged with `request_id`
    Pending { request_id: u64 },
    Ready(ChangelogResult),
}

/// Commit picked for pinning, awaiting confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmOverlay {
    pub commit: Commit,
    pub lock_url: String,
    /// The lock command has been started
    pub in_flight: bool,
}

#[derive(Debug)]
pub struct ChangelogView {
    pub parent: ListView,
    pub input: FlakeInput,
    pub info: RepoInfo,
    pub load: ChangelogLoad,
    pub cursor: usize,
    pub overlay: Option<ConfirmOverlay>,
}

impl ChangelogView {
    pub fn pending(parent: ListView, input: FlakeInput, info: RepoInfo, request_id: u64) -> Self {
        Self {
            parent,
            input,
            info,
            load: ChangelogLoad::Pending { request_id },
            cursor: 0,
            overlay: None,
        }
    }

    pub fn is_waiting_for(&self, request_id: u64) -> bool {
        self.load == ChangelogLoad::Pending { request_id }
    }

    /// Show loaded commits with the cursor on the pinned one
    pub fn set_ready(&mut self, changelog: ChangelogResult) {
        self.cursor = changelog.pinned_index.unwrap_or(0);
        self.load = ChangelogLoad::Ready(changelog);
    }

    pub fn changelog(&self) -> Option<&ChangelogResult> {
        match &self.load {
            ChangelogLoad::Ready(changelog) => Some(changelog),
            ChangelogLoad::Pending { .. } => None,
        }
    }

    pub fn current_commit(&self) -> Option<&Commit> {
        self.changelog()?.commits.get(self.cursor)
    }

    pub fn cursor_down(&mut self) {
        let len = self.changelog().map_or(0, |c| c.commits.len());
        if self.cursor + 1 < len {
            self.cursor += 1;
        }
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }
}

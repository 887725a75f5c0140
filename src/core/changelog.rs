//! Changelog assembly around the pinned commit.
//!
//! # Public API
//! - [`assemble`]: Merge commits ahead of and behind the pin into one list
//! - [`Traversal`]: Raw outcome of a history walk, before assembly
//!
//! The pinned commit is the first commit of the behind list when it matches the
//! locked revision. When the pin cannot be located (force-push, divergent history
//! or a traversal limit) the result carries no pinned index and no commit is marked.

use crate::core::commit::{ChangelogResult, Commit};

/// Outcome of walking an input's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Traversal {
    /// Pin is an ancestor of the ref: commits strictly newer than it, and the
    /// pin followed by its ancestors
    Anchored {
        ahead: Vec<Commit>,
        behind: Vec<Commit>,
    },
    /// Pin is not an ancestor; a newest-first log of the ref, with the position
    /// of the pin when it was found anyway
    Flat {
        commits: Vec<Commit>,
        pinned: Option<usize>,
    },
}

impl Traversal {
    /// Commits newer than the pin
    pub fn commits_since(self) -> Vec<Commit> {
        match self {
            Traversal::Anchored { ahead, .. } => ahead,
            Traversal::Flat {
                mut commits,
                pinned,
            } => {
                if let Some(index) = pinned {
                    commits.truncate(index);
                }
                commits
            }
        }
    }

    pub fn into_changelog(self, rev: &str) -> ChangelogResult {
        match self {
            Traversal::Anchored { ahead, behind } => assemble(ahead, behind, rev),
            Traversal::Flat { commits, pinned } => mark_pinned(commits, pinned),
        }
    }
}

/// Merge `ahead` (newer than the pin) and `behind` (pin and older) into a changelog
pub fn assemble(mut ahead: Vec<Commit>, mut behind: Vec<Commit>, rev: &str) -> ChangelogResult {
    for commit in ahead.iter_mut().chain(behind.iter_mut()) {
        commit.is_pinned = false;
    }

    let pinned = behind.first().is_some_and(|commit| commit.matches_rev(rev));
    let pinned_index = pinned.then_some(ahead.len());

    ahead.append(&mut behind);
    mark_pinned(ahead, pinned_index)
}

fn mark_pinned(mut commits: Vec<Commit>, pinned_index: Option<usize>) -> ChangelogResult {
    let pinned_index = pinned_index.filter(|&index| index < commits.len());
    for (index, commit) in commits.iter_mut().enumerate() {
        commit.is_pinned = Some(index) == pinned_index;
    }
    ChangelogResult {
        commits,
        pinned_index,
    }
}

//! Common assertion helpers for test output validation
//!
//! Provides predicates for the binary's output and checks on sweep status streams.

#![allow(dead_code)]

use flake_navigator::core::aggregator::UpdateStatus;
use predicates::prelude::*;
use std::collections::HashMap;

/// Creates a predicate that checks for the missing-flake error
pub fn flake_not_found() -> impl Predicate<str> {
    predicates::str::contains("No flake.nix found")
}

/// Creates a predicate that checks for the clear-cache confirmation
pub fn cache_cleared_or_absent() -> impl Predicate<str> {
    predicates::str::contains("Removed clone cache").or(predicates::str::contains("No clone cache"))
}

/// Every input gets `Loading` before any terminal status, then exactly one
/// terminal status
pub fn assert_sweep_ordering(events: &[(String, UpdateStatus)], expected_inputs: usize) {
    let first_terminal = events
        .iter()
        .position(|(_, status)| status.is_terminal())
        .unwrap_or(events.len());
    let loading: Vec<_> = events
        .iter()
        .filter(|(_, status)| !status.is_terminal())
        .collect();
    assert_eq!(loading.len(), expected_inputs, "one Loading per input");
    assert_eq!(first_terminal, expected_inputs, "all Loading events come first");

    let mut terminal: HashMap<&str, usize> = HashMap::new();
    for (name, status) in events {
        if status.is_terminal() {
            *terminal.entry(name.as_str()).or_default() += 1;
        }
    }
    assert_eq!(terminal.len(), expected_inputs, "every input finishes");
    assert!(terminal.values().all(|&count| count == 1), "one terminal status each");
}

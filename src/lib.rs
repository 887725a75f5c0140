//! Flake Navigator - inspect, update and pin the inputs of a Nix flake.
//!
//! The library is split in three layers:
//! - [`core`]: the flake-input synchronization engine (forge resolution, commit
//!   history through forge APIs or cached bare clones, update sweeps, changelogs,
//!   lock URLs) and the `nix` wrapper
//! - [`app`]: the interactive browser's state machine and rendering
//! - [`commands`]: the CLI entry points
//!
//! # Public API
//! The engine types are re-exported from [`core`] for external users.

pub mod app;
pub mod commands;
pub mod core;

pub use crate::core::{
    lock_url,
    resolve,
    ChangelogResult,
    Commit,
    CommitHistory,
    Flake,
    FlakeInput,
    FlakeNavigatorError,
    Forge,
    ForgeKind,
    HistoryError,
    HistoryService,
    InputKind,
    RepoInfo,
    Result,
    SweepOutcome,
    UpdateChecker,
    UpdateStatus,
};

//! Core functionality for the flake-navigator tool.
//!
//! This module provides the flake-input synchronization engine (forge resolution,
//! commit history, update sweeps, changelogs, lock URLs) together with the `nix`
//! wrapper, error handling, configuration and output helpers.

pub mod aggregator;
pub mod cache;
pub mod changelog;
pub mod colors;
pub mod commit;
pub mod config;
pub mod dirs;
pub mod error;
pub mod forge;
pub mod forge_api;
pub mod git;
pub mod history;
pub mod http;
pub mod input;
pub mod lock_url;
pub mod logging;
pub mod nix;
pub mod output;
pub mod process;
pub mod resolver;
pub mod status;
pub mod time;

// === Error handling ===
// Error types for each boundary and the application result type
pub use error::{FlakeNavigatorError, HistoryError, ProcessError, Result};

// === Flake model ===
// Inputs as reported by `nix flake metadata`
pub use input::{Flake, FlakeInput, InputKind};

// === Forge resolution ===
// Classify inputs by hosting forge and build pinning URLs
pub use forge::{Forge, ForgeKind, RepoInfo};
pub use lock_url::lock_url;
pub use resolver::resolve;

// === Commit history ===
// API and local-clone strategies behind one trait
pub use cache::{CacheCheckout, CloneCache, EnsureOutcome};
pub use changelog::{assemble, Traversal};
pub use commit::{ChangelogResult, Commit};
pub use history::{CommitHistory, HistoryService};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport};

// === Update sweeps ===
// Batched, cancellable status checks for every input
pub use aggregator::{SweepOutcome, UpdateChecker, UpdateStatus};

// === External tool ===
// `nix` invocations and metadata parsing
pub use nix::{NixCli, NixOperations};
pub use process::CommandRunner;

// === Configuration ===
pub use config::{ApiTokens, EngineConfig};

// === Output formatting ===
// Unified output formatting for consistent CLI presentation
pub use colors::{format_input_line, get_status_color_style};
pub use output::{print_error, print_info, print_section_header, print_success, print_warning};
pub use status::{MessageLevel, StatusMessage};

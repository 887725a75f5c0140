//! Domain-specific error types and error handling utilities.
//!
//! Errors are split by boundary so each layer only sees the failures it can act on.
//!
//! # Public API
//! - [`FlakeNavigatorError`]: Application-level errors (flake loading, `nix` invocations, CLI)
//! - [`HistoryError`]: Commit-history retrieval errors, stored per input in update statuses
//! - [`ProcessError`]: Failures of an external process run by [`crate::core::process`]
//! - [`Result<T>`]: Type alias for `std::result::Result<T, FlakeNavigatorError>`
//!
//! # Error Categories
//! - **Flake operations**: Missing `flake.nix`, unparsable metadata, failed `nix` commands
//! - **History retrieval**: Rate limits, authentication, network and git failures
//! - **Cancellation**: Every boundary has an `Aborted` variant raised once the shared
//!   cancellation token fires
//! - **Cache operations**: Cache directory resolution and removal

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors for flake-navigator
#[derive(Error, Debug)]
pub enum FlakeNavigatorError {
    // Flake errors
    #[error("No flake.nix found at {path}")]
    FlakeNotFound { path: PathBuf },

    #[error("Failed to parse flake metadata: {message}")]
    MetadataParse { message: String },

    // External tool errors
    #[error("`{command}` failed: {stderr}")]
    ToolFailed { command: String, stderr: String },

    #[error("`{command}` timed out after {seconds}s")]
    ToolTimedOut { command: String, seconds: u64 },

    #[error("Operation aborted")]
    Aborted,

    // Cache errors
    #[error("Could not find cache directory")]
    CacheDirectoryNotFound,

    #[error("Failed to clear cache directory '{path}': {source}")]
    CacheClearFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    // Config errors
    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results using FlakeNavigatorError
pub type Result<T> = std::result::Result<T, FlakeNavigatorError>;

impl FlakeNavigatorError {
    /// Create a flake not found error
    pub fn flake_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FlakeNotFound { path: path.into() }
    }

    /// Create a metadata parse error
    pub fn metadata_parse(message: impl Into<String>) -> Self {
        Self::MetadataParse {
            message: message.into(),
        }
    }

    /// Create a tool failed error from the command line and captured stderr
    pub fn tool_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::ToolFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a cache clear failed error
    pub fn cache_clear_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheClearFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a config parse failed error
    pub fn config_parse_failed(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::ConfigParseFailed {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while retrieving commit history for an input.
///
/// `Clone` because a failure is stored in the input's update status and shown later.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Rate limited by {forge}")]
    RateLimited { forge: String },

    #[error("Authentication failed for {forge}")]
    AuthFailed { forge: String },

    #[error("Repository not found: {what}")]
    NotFound { what: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Operation aborted")]
    Aborted,

    #[error("Timed out: {what}")]
    TimedOut { what: String },

    #[error("Clone cache error: {message}")]
    Cache { message: String },
}

impl HistoryError {
    pub fn rate_limited(forge: impl Into<String>) -> Self {
        Self::RateLimited {
            forge: forge.into(),
        }
    }

    pub fn auth_failed(forge: impl Into<String>) -> Self {
        Self::AuthFailed {
            forge: forge.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// True for failures the local clone strategy can't do better on
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::AuthFailed { .. } | Self::Aborted
        )
    }
}

/// Failure of an external process
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Operation aborted")]
    Aborted,

    #[error("`{command}` timed out after {seconds}s")]
    TimedOut { command: String, seconds: u64 },

    #[error("`{command}` exited with {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

impl From<ProcessError> for HistoryError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Aborted => HistoryError::Aborted,
            ProcessError::TimedOut { command, .. } => HistoryError::TimedOut { what: command },
            ProcessError::Failed {
                command, stderr, ..
            } => HistoryError::CommandFailed { command, stderr },
            ProcessError::Spawn { command, source } => HistoryError::CommandFailed {
                command,
                stderr: source.to_string(),
            },
        }
    }
}

impl From<ProcessError> for FlakeNavigatorError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Aborted => FlakeNavigatorError::Aborted,
            ProcessError::TimedOut { command, seconds } => {
                FlakeNavigatorError::ToolTimedOut { command, seconds }
            }
            ProcessError::Failed {
                command, stderr, ..
            } => FlakeNavigatorError::ToolFailed { command, stderr },
            ProcessError::Spawn { source, .. } => FlakeNavigatorError::Io(source),
        }
    }
}

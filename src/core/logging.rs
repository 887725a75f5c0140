//! Logger setup.
//!
//! The interactive browser owns the terminal, so log records go to
//! `<data dir>/flake-navigator/flake-navigator.log` instead of stderr. The
//! non-interactive commands log to stderr as usual.

use crate::core::dirs::get_data_directory;
use std::fs::OpenOptions;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File,
}

/// Initialise `env_logger`; `RUST_LOG` wins over the `debug` flag.
///
/// Returns the log file path when logging to a file.
pub fn init(debug: bool, target: LogTarget) -> Option<PathBuf> {
    let default_level = if debug { "debug" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    let mut log_path = None;
    if target == LogTarget::File {
        match open_log_file() {
            Ok((path, file)) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
                log_path = Some(path);
            }
            // Nowhere safe to write: stay silent rather than garble the screen
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }

    if builder.try_init().is_err() {
        return None;
    }
    if let Some(path) = &log_path {
        log::debug!("Logging to {}", path.display());
    }
    log_path
}

fn open_log_file() -> std::io::Result<(PathBuf, std::fs::File)> {
    let dir = get_data_directory()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))?;
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("flake-navigator.log");
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

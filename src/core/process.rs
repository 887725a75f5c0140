//! Cancellable external process execution.
//!
//! Every `git` and `nix` invocation goes through [`CommandRunner`], which races
//! the child against a timeout and the shared cancellation token. Children are
//! spawned with `kill_on_drop`, so losing the race kills the process.

use crate::core::error::ProcessError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct CommandRunner {
    cancel: CancellationToken,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `program args...` and return its stdout
    pub async fn run<I, S>(
        &self,
        program: &str,
        args: I,
        cwd: Option<&Path>,
    ) -> Result<String, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        let command_line = describe(program, &args);

        if self.cancel.is_cancelled() {
            return Err(ProcessError::Aborted);
        }

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        log::debug!("Running {command_line}");
        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        let output = tokio::select! {
            _ = self.cancel.cancelled() => {
                log::debug!("Cancelled {command_line}");
                return Err(ProcessError::Aborted);
            }
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(output) => output.map_err(|source| ProcessError::Spawn {
                    command: command_line.clone(),
                    source,
                })?,
                Err(_) => {
                    log::warn!("Timed out after {:?}: {command_line}", self.timeout);
                    return Err(ProcessError::TimedOut {
                        command: command_line,
                        seconds: self.timeout.as_secs(),
                    });
                }
            },
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log::debug!("{command_line} failed: {stderr}");
            return Err(ProcessError::Failed {
                command: command_line,
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn describe(program: &str, args: &[std::ffi::OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

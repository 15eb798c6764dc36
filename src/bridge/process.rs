/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! One-shot subprocess execution for external tools.
//!
//! Each call spawns one process, optionally feeds it stdin, collects both
//! output streams, and classifies the result:
//! - spawn failure, nonzero exit or timeout is a process failure;
//! - zero exit is a success if stdout is UTF-8, malformed output otherwise;
//! - cancellation kills the child and reports `Cancelled`.
//!
//! Commands are executed directly, never through a shell.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use super::cancel::CancelSignal;

/// Maximum stderr kept for diagnostics, in bytes.
const MAX_STDERR_BYTES: usize = 16 * 1024; // 16KB

/// A single tool run: what to execute and what to feed it.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Executable name or path.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Content piped to stdin. Stdin is null when `None`.
    pub stdin: Option<String>,
    /// Working directory for the process.
    pub cwd: Option<PathBuf>,
    /// Kill the process after this long.
    pub timeout: Option<Duration>,
}

impl ToolInvocation {
    /// Creates an invocation of `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            cwd: None,
            timeout: None,
        }
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the stdin payload.
    #[must_use]
    pub fn stdin(mut self, content: impl Into<String>) -> Self {
        self.stdin = Some(content.into());
        self
    }

    /// Runs the tool in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Sets or clears the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the tool in the directory containing `file`, if that directory
    /// exists. Unsaved buffers may name files in directories that do not.
    #[must_use]
    pub fn in_dir_of(self, file: &Path) -> Self {
        match file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && dir.is_dir() => self.current_dir(dir),
            _ => self,
        }
    }
}

/// Output of a tool that exited zero.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Full standard output, exactly as written.
    pub stdout: String,
    /// Standard error, truncated.
    pub stderr: String,
    /// Wall time from spawn to exit.
    pub elapsed: Duration,
}

/// Why a tool run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitInfo {
    /// The process could not be started.
    Spawn {
        /// The I/O error kind, `NotFound` for a missing binary.
        kind: io::ErrorKind,
        /// The OS error message.
        message: String,
    },
    /// Waiting on the process failed.
    Wait {
        /// The OS error message.
        message: String,
    },
    /// The process exited unsuccessfully.
    Status {
        /// Exit code, `None` if killed by a signal.
        code: Option<i32>,
        /// Standard error, truncated.
        stderr: String,
    },
    /// The process outlived its timeout and was killed.
    TimedOut(Duration),
}

impl ExitInfo {
    /// Whether the executable was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { kind, .. } if *kind == io::ErrorKind::NotFound)
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { message, .. } => write!(f, "failed to spawn: {message}"),
            Self::Wait { message } => write!(f, "failed waiting for exit: {message}"),
            Self::Status { code: Some(code), stderr } if stderr.is_empty() => {
                write!(f, "exited with code {code}")
            }
            Self::Status { code: Some(code), stderr } => {
                write!(f, "exited with code {code}: {}", stderr.trim_end())
            }
            Self::Status { code: None, .. } => write!(f, "terminated by signal"),
            Self::TimedOut(after) => write!(f, "timed out after {}ms", after.as_millis()),
        }
    }
}

/// Classified result of a tool run.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// Exit zero.
    Success(ToolOutput),
    /// Spawn failure, nonzero exit or timeout.
    ProcessFailure(ExitInfo),
    /// Exit zero but stdout is not UTF-8. Holds a lossy copy for logs only.
    MalformedOutput(String),
    /// Cancelled before exit; the process was killed.
    Cancelled,
}

/// Runs `invocation` to completion, cancellation or timeout.
///
/// The child is owned by the wait future and marked `kill_on_drop`, so losing
/// the race against `cancel` or the timeout terminates it.
pub async fn invoke(invocation: &ToolInvocation, cancel: &CancelSignal) -> ToolOutcome {
    if cancel.is_cancelled() {
        return ToolOutcome::Cancelled;
    }

    debug!(
        "Invoking: {} {:?} in {:?}",
        invocation.program.display(),
        invocation.args,
        invocation.cwd
    );

    let stdin_cfg = if invocation.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(stdin_cfg)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }

    let started = Instant::now();
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!("Failed to spawn {}: {e}", invocation.program.display());
            return ToolOutcome::ProcessFailure(ExitInfo::Spawn {
                kind: e.kind(),
                message: e.to_string(),
            });
        }
    };

    // Written from its own task so a tool that fills stdout before draining
    // stdin cannot deadlock us. Dropping the pipe closes stdin.
    if let (Some(content), Some(mut pipe)) = (invocation.stdin.clone(), child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(content.as_bytes()).await {
                debug!("Tool stopped reading stdin: {e}");
            }
        });
    }

    let deadline = async {
        match invocation.timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = child.wait_with_output() => match result {
            Ok(output) if output.status.success() => {
                let elapsed = started.elapsed();
                trace!("{} finished in {:?}", invocation.program.display(), elapsed);
                match String::from_utf8(output.stdout) {
                    Ok(stdout) => ToolOutcome::Success(ToolOutput {
                        stdout,
                        stderr: truncate_output(&output.stderr),
                        elapsed,
                    }),
                    Err(e) => {
                        debug!("{} wrote non-UTF-8 stdout", invocation.program.display());
                        ToolOutcome::MalformedOutput(
                            String::from_utf8_lossy(e.as_bytes()).into_owned(),
                        )
                    }
                }
            }
            Ok(output) => ToolOutcome::ProcessFailure(ExitInfo::Status {
                code: output.status.code(),
                stderr: truncate_output(&output.stderr),
            }),
            Err(e) => ToolOutcome::ProcessFailure(ExitInfo::Wait {
                message: e.to_string(),
            }),
        },
        () = cancel.cancelled() => {
            debug!("Cancelled, killing {}", invocation.program.display());
            ToolOutcome::Cancelled
        }
        () = deadline => {
            let limit = invocation.timeout.unwrap_or_default();
            debug!("{} timed out after {:?}", invocation.program.display(), limit);
            ToolOutcome::ProcessFailure(ExitInfo::TimedOut(limit))
        }
    }
}

/// Truncates output to `MAX_STDERR_BYTES`, converting to lossy UTF-8.
fn truncate_output(bytes: &[u8]) -> String {
    if bytes.len() <= MAX_STDERR_BYTES {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        let truncated = String::from_utf8_lossy(&bytes[..MAX_STDERR_BYTES]);
        format!("{truncated}\n... (output truncated at {MAX_STDERR_BYTES} bytes)")
    }
}

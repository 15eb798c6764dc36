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

//! Declaration lookup through a `godef`-style tool.
//!
//! The tool is run as `<tool> -t -i -f <path> -o <offset>` with the live
//! buffer on stdin, so lookups see unsaved edits. Its first output line is
//! `<path>:<line>:<col>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::cancel::CancelSignal;
use super::position::{
    LocationParseError, OffsetEncoding, Position, PositionError, SourceLocation, TextBuffer,
    parse_location,
};
use super::process::{ExitInfo, ToolInvocation, ToolOutcome, invoke};
use super::tools::resolve_program;
use crate::config::Config;

/// Result of a lookup that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// The tool reported a location.
    Found(SourceLocation),
    /// The tool ran and exited nonzero, which is how `godef` reports a symbol
    /// without a declaration.
    NotFound(ExitInfo),
    /// The tool could not run to completion: missing binary, timeout, or
    /// killed by a signal.
    ToolError(ExitInfo),
}

impl Declaration {
    /// Collapses to the editor-facing result: a location, or nothing.
    #[must_use]
    pub fn into_location(self) -> Option<SourceLocation> {
        match self {
            Self::Found(location) => Some(location),
            Self::NotFound(_) | Self::ToolError(_) => None,
        }
    }
}

/// Lookup failures that are not "no declaration".
#[derive(Debug, Error)]
pub enum DeclarationError {
    /// The request position is outside the buffer.
    #[error("invalid position: {0}")]
    InvalidPosition(#[from] PositionError),
    /// The tool exited zero but printed nothing, something unparseable, or
    /// bytes that are not UTF-8.
    #[error("declaration tool returned malformed output: {source}")]
    MalformedOutput {
        /// Full stdout of the tool.
        raw: String,
        /// Why the first line did not parse.
        #[source]
        source: LocationParseError,
    },
    /// The request was cancelled and the tool killed.
    #[error("declaration lookup cancelled")]
    Cancelled,
}

/// Resolves "where is the symbol at this position declared".
#[derive(Debug, Clone)]
pub struct DeclarationResolver {
    program: PathBuf,
    command: String,
    extra_args: Vec<String>,
    encoding: OffsetEncoding,
    timeout: Option<Duration>,
}

impl DeclarationResolver {
    /// Builds a resolver from the `[declaration]` section of `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let declaration = &config.declaration;
        Self {
            program: resolve_program(&declaration.command, &config.tools_path),
            command: declaration.command.clone(),
            extra_args: declaration.args.clone(),
            encoding: declaration.offset_encoding,
            timeout: declaration.timeout(),
        }
    }

    /// Builds the tool invocation for a lookup at `offset`.
    fn invocation(&self, buffer: &TextBuffer, path: &Path, offset: usize) -> ToolInvocation {
        ToolInvocation::new(&self.program)
            .args(self.extra_args.iter().cloned())
            .args([
                "-t".to_string(),
                "-i".to_string(),
                "-f".to_string(),
                path.to_string_lossy().into_owned(),
                "-o".to_string(),
                offset.to_string(),
            ])
            .stdin(buffer.text())
            .timeout(self.timeout)
            .in_dir_of(path)
    }

    /// Looks up the declaration of the symbol at `position` in `buffer`,
    /// which holds the current (possibly unsaved) contents of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError::InvalidPosition`] for a position outside
    /// the buffer, [`DeclarationError::MalformedOutput`] when the tool
    /// succeeds with unparseable, blank or non-UTF-8 output, and
    /// [`DeclarationError::Cancelled`] when `cancel` fires first. Tool
    /// failures are not errors; they are reported as
    /// [`Declaration::NotFound`] or [`Declaration::ToolError`].
    pub async fn resolve(
        &self,
        buffer: &TextBuffer,
        path: &Path,
        position: Position,
        cancel: &CancelSignal,
    ) -> Result<Declaration, DeclarationError> {
        let offset = buffer.offset(position, self.encoding)?;
        debug!(
            "Declaration lookup: {}:{}:{} (offset {offset})",
            path.display(),
            position.line,
            position.column
        );

        let invocation = self.invocation(buffer, path, offset);
        match invoke(&invocation, cancel).await {
            ToolOutcome::Success(output) => classify_output(output.stdout),
            ToolOutcome::MalformedOutput(raw) => Err(DeclarationError::MalformedOutput {
                raw,
                source: LocationParseError::InvalidUtf8,
            }),
            ToolOutcome::ProcessFailure(info @ ExitInfo::Status { code: Some(_), .. }) => {
                debug!("No declaration: {info}");
                Ok(Declaration::NotFound(info))
            }
            ToolOutcome::ProcessFailure(info) => {
                if info.is_not_found() {
                    warn!(
                        "Declaration tool '{}' not found. Install it or add its directory to tools_path.",
                        self.command
                    );
                } else {
                    debug!("Declaration tool failed: {info}");
                }
                Ok(Declaration::ToolError(info))
            }
            ToolOutcome::Cancelled => Err(DeclarationError::Cancelled),
        }
    }
}

/// Blank output is malformed like any other unparseable output.
fn classify_output(stdout: String) -> Result<Declaration, DeclarationError> {
    match parse_location(&stdout) {
        Ok(location) => Ok(Declaration::Found(location)),
        Err(source) => Err(DeclarationError::MalformedOutput { raw: stdout, source }),
    }
}

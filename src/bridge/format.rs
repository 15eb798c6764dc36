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

//! Whole-document formatting through a `gofmt`-style tool.
//!
//! The tool's stdout replaces the entire buffer in a single edit. By default
//! the tool reads the file from disk, so unsaved edits are not formatted;
//! `format.input = "stdin"` pipes the live buffer instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::cancel::CancelSignal;
use super::position::{LineInfo, Position, Range, TextBuffer};
use super::process::{ToolInvocation, ToolOutcome, invoke};
use super::tools::resolve_program;
use crate::config::{Config, FormatInput};

/// Characters whose insertion should trigger a reformat. A hint for hosts;
/// nothing here acts on it.
pub const AUTO_FORMAT_TRIGGER_CHARACTERS: [&str; 3] = [";", "}", "\n"];

/// Runs slower than this are logged; hosts may abort format-on-save.
const SLOW_FORMAT: Duration = Duration::from_millis(750);

/// A replacement of `range` with `replacement_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    /// The new text.
    pub replacement_text: String,
    /// The replaced range.
    pub range: Range,
}

/// Formatting failures surfaced to the user.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The tool failed. Missing binaries land here too.
    #[error("Cannot format due to syntax errors.")]
    SyntaxErrors {
        /// What the tool reported, for logs.
        detail: String,
    },
    /// The tool exited cleanly but wrote bytes that are not UTF-8.
    #[error("Formatter output is not valid UTF-8.")]
    InvalidOutput {
        /// Lossy copy of the output, for logs.
        detail: String,
    },
    /// The request was cancelled and the tool killed.
    #[error("formatting cancelled")]
    Cancelled,
}

/// Reformats whole documents.
#[derive(Debug, Clone)]
pub struct Formatter {
    program: PathBuf,
    command: String,
    flags: Vec<String>,
    input: FormatInput,
    timeout: Option<Duration>,
}

impl Formatter {
    /// Builds a formatter from the `[format]` section of `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let format = &config.format;

        // Writing the file in place would bypass the editor's undo stack
        let flags = format
            .flags
            .iter()
            .filter(|flag| flag.as_str() != "-w")
            .cloned()
            .collect();

        Self {
            program: resolve_program(&format.command, &config.tools_path),
            command: format.command.clone(),
            flags,
            input: format.input,
            timeout: format.timeout(),
        }
    }

    fn invocation(&self, path: &Path, buffer: &TextBuffer) -> ToolInvocation {
        let invocation = ToolInvocation::new(&self.program)
            .args(self.flags.iter().cloned())
            .timeout(self.timeout)
            .in_dir_of(path);

        match self.input {
            FormatInput::Disk => invocation.args([path.to_string_lossy().into_owned()]),
            FormatInput::Stdin if self.needs_srcdir() => invocation
                .args(["-srcdir".to_string(), path.to_string_lossy().into_owned()])
                .stdin(buffer.text()),
            FormatInput::Stdin => invocation.stdin(buffer.text()),
        }
    }

    /// `goimports` and `goreturns` resolve imports relative to `-srcdir`,
    /// which stdin input otherwise hides from them.
    fn needs_srcdir(&self) -> bool {
        Path::new(&self.command)
            .file_stem()
            .is_some_and(|stem| stem == "goimports" || stem == "goreturns")
    }

    /// Formats `path`, whose editor contents are `buffer`.
    ///
    /// Returns exactly one edit replacing `(1, 1)` through the end of the last
    /// line with the tool's stdout, verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::SyntaxErrors`] when the tool cannot be spawned or
    /// exits nonzero, [`FormatError::InvalidOutput`] when its output is not
    /// UTF-8, and [`FormatError::Cancelled`] when `cancel` fires first.
    pub async fn format(
        &self,
        path: &Path,
        buffer: &TextBuffer,
        cancel: &CancelSignal,
    ) -> Result<Vec<TextEdit>, FormatError> {
        debug!("Formatting {} with {}", path.display(), self.command);

        match invoke(&self.invocation(path, buffer), cancel).await {
            ToolOutcome::Success(output) => {
                if output.elapsed > SLOW_FORMAT {
                    warn!(
                        "Formatting {} took {}ms; format-on-save may be aborted",
                        path.display(),
                        output.elapsed.as_millis()
                    );
                }
                Ok(vec![whole_buffer_edit(buffer, output.stdout)])
            }
            ToolOutcome::MalformedOutput(raw) => {
                warn!("Format tool '{}' wrote non-UTF-8 output", self.command);
                Err(FormatError::InvalidOutput { detail: raw })
            }
            ToolOutcome::ProcessFailure(info) => {
                if info.is_not_found() {
                    warn!(
                        "Format tool '{}' not found. Install it or add its directory to tools_path.",
                        self.command
                    );
                } else {
                    debug!("Format tool failed: {info}");
                }
                Err(FormatError::SyntaxErrors {
                    detail: info.to_string(),
                })
            }
            ToolOutcome::Cancelled => Err(FormatError::Cancelled),
        }
    }
}

/// An edit replacing everything in `lines` with `text`.
#[must_use]
pub fn whole_buffer_edit(lines: &impl LineInfo, text: String) -> TextEdit {
    let last_line = lines.line_count();
    let last_column = lines.max_column(last_line).unwrap_or(1);
    let start = Position::new(1, 1);

    TextEdit {
        replacement_text: text,
        range: Range {
            start_line: start.line,
            start_col: start.column,
            end_line: last_line,
            end_col: last_column,
        },
    }
}

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

//! Editor-facing entry points.
//!
//! Wraps the resolver and formatter with the shapes a host editor consumes:
//! a location with a resource URI (or nothing), and a list of edits.

use anyhow::{Result, anyhow};
use lsp_types::Uri;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::cancel::CancelSignal;
use super::declaration::{Declaration, DeclarationError, DeclarationResolver};
use super::format::{FormatError, Formatter, TextEdit};
use super::position::{Position, Range, SourceLocation, TextBuffer};
use super::tools::find_tool;
use crate::config::Config;

/// A declaration site as the editor consumes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    /// Resource handle for `path`.
    pub uri: Uri,
    /// Absolute path of the declaring file.
    pub path: PathBuf,
    /// One-column anchor at the declaration.
    pub range: Range,
}

/// Formatting preferences sent by editors. Indentation is left entirely to the
/// external tool, so these are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingOptions {
    /// Spaces per tab.
    #[serde(default)]
    pub tab_size: Option<u32>,
    /// Indent with spaces rather than tabs.
    #[serde(default)]
    pub insert_spaces: Option<bool>,
}

/// Whether a configured tool could be located.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    /// What the tool is used for.
    pub role: &'static str,
    /// The configured command.
    pub command: String,
    /// Where it was found, if anywhere.
    pub resolved: Option<PathBuf>,
}

/// Declaration lookup and formatting for one configuration.
pub struct Bridge {
    config: Config,
    resolver: DeclarationResolver,
    formatter: Formatter,
}

impl Bridge {
    /// Builds the bridge, locating both tools up front.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            resolver: DeclarationResolver::new(&config),
            formatter: Formatter::new(&config),
            config,
        }
    }

    /// Finds where the symbol at `position` in `path` is declared.
    ///
    /// `text` is the live buffer. Returns `Ok(None)` when the tool finds
    /// nothing or fails; tool failures are never surfaced as errors.
    ///
    /// # Errors
    ///
    /// Returns an error for an out-of-range position, malformed tool output,
    /// or cancellation.
    pub async fn resolve_declaration(
        &self,
        path: &Path,
        text: &str,
        position: Position,
        cancel: &CancelSignal,
    ) -> Result<Option<Location>, DeclarationError> {
        let buffer = TextBuffer::new(text);
        let declaration = self.resolver.resolve(&buffer, path, position, cancel).await?;

        if let Declaration::ToolError(info) = &declaration {
            debug!("No declaration for {}: {info}", path.display());
        }

        Ok(declaration
            .into_location()
            .and_then(|location| to_location(location, path)))
    }

    /// Formats `path`, whose editor contents are `text`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] when the tool fails or the request is cancelled.
    pub async fn format_document(
        &self,
        path: &Path,
        text: &str,
        _options: &FormattingOptions,
        cancel: &CancelSignal,
    ) -> Result<Vec<TextEdit>, FormatError> {
        let buffer = TextBuffer::new(text);
        self.formatter.format(path, &buffer, cancel).await
    }

    /// Reports where each configured tool resolves.
    #[must_use]
    pub fn tool_status(&self) -> Vec<ToolStatus> {
        [
            ("declaration", &self.config.declaration.command),
            ("format", &self.config.format.command),
        ]
        .into_iter()
        .map(|(role, command)| ToolStatus {
            role,
            command: command.clone(),
            resolved: find_tool(command, &self.config.tools_path),
        })
        .collect()
    }
}

/// Attaches a resource URI to a tool-reported location. Relative paths are
/// taken relative to the directory of the requesting file.
fn to_location(location: SourceLocation, requested: &Path) -> Option<Location> {
    let path = if location.path.is_absolute() {
        location.path
    } else {
        let base = requested.parent().unwrap_or_else(|| Path::new(""));
        std::path::absolute(base.join(&location.path)).ok()?
    };

    match path_to_uri(&path) {
        Ok(uri) => Some(Location {
            uri,
            path,
            range: location.range,
        }),
        Err(e) => {
            debug!("Dropping declaration: {e}");
            None
        }
    }
}

/// Converts an absolute file path to a `file://` URI.
///
/// # Errors
///
/// Returns an error if the path is relative or cannot be represented as a URI.
pub fn path_to_uri(path: &Path) -> Result<Uri> {
    let url = url::Url::from_file_path(path)
        .map_err(|()| anyhow!("Invalid path for URI: {}", path.display()))?;
    url.as_str()
        .parse()
        .map_err(|e| anyhow!("Invalid path for URI: {}: {}", path.display(), e))
}

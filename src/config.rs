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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::OffsetEncoding;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Directories searched for tools before `$PATH` (e.g. `$GOPATH/bin`)
    #[serde(default)]
    pub tools_path: Vec<PathBuf>,

    /// Declaration lookup tool
    #[serde(default)]
    pub declaration: DeclarationConfig,

    /// Formatting tool
    #[serde(default)]
    pub format: FormatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeclarationConfig {
    /// The command to execute (e.g., "godef")
    #[serde(default = "default_declaration_command")]
    pub command: String,

    /// Arguments placed before `-t -i -f <path> -o <offset>`
    #[serde(default)]
    pub args: Vec<String>,

    /// How the cursor position is turned into `-o <offset>`
    #[serde(default)]
    pub offset_encoding: OffsetEncoding,

    /// Kill the tool after this many seconds (default: no limit)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormatConfig {
    /// The command to execute (e.g., "goreturns", "gofmt")
    #[serde(default = "default_format_command")]
    pub command: String,

    /// Flags placed before the file path. `-w` is ignored.
    #[serde(default)]
    pub flags: Vec<String>,

    /// Where the formatter reads the source from
    #[serde(default)]
    pub input: FormatInput,

    /// Kill the tool after this many seconds (default: no limit)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Source the formatter reads.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormatInput {
    /// The file on disk, passed by path. Unsaved edits are not formatted.
    #[default]
    Disk,
    /// The live buffer, piped on stdin with no path argument.
    Stdin,
}

fn default_declaration_command() -> String {
    "godef".to_string()
}

fn default_format_command() -> String {
    "goreturns".to_string()
}

impl Default for DeclarationConfig {
    fn default() -> Self {
        Self {
            command: default_declaration_command(),
            args: Vec::new(),
            offset_encoding: OffsetEncoding::default(),
            timeout_secs: None,
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            command: default_format_command(),
            flags: Vec::new(),
            input: FormatInput::default(),
            timeout_secs: None,
        }
    }
}

impl DeclarationConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl FormatConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from standard paths or a specific file.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        // ~/.config/toolbridge/config.toml
        let user_file = dirs::config_dir()
            .map(|dir| dir.join("toolbridge").join("config.toml"))
            .filter(|path| path.exists());

        Self::load_from(user_file.as_deref(), explicit_file.as_deref())
    }

    fn load_from(user_file: Option<&Path>, explicit_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // 1. Start with defaults
        builder = builder
            .set_default("declaration.command", default_declaration_command())?
            .set_default("format.command", default_format_command())?;

        // 2. User config directory
        if let Some(path) = user_file {
            builder = builder.add_source(config::File::from(path));
        }

        // 3. Explicit file
        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path));
        }

        // 4. Environment (TOOLBRIDGE_FORMAT__COMMAND, TOOLBRIDGE_TOOLS_PATH, ...)
        builder = builder.add_source(
            config::Environment::with_prefix("TOOLBRIDGE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("tools_path")
                .with_list_parse_key("declaration.args")
                .with_list_parse_key("format.flags")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config.try_deserialize().context("Failed to deserialize configuration")
    }
}

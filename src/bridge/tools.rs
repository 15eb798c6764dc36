// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Locating tool executables.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Finds `command` in `extra_dirs`, then on `$PATH`.
///
/// A command containing a path separator is checked as given.
#[must_use]
pub fn find_tool(command: &str, extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_tool_in(command, extra_dirs, &path_var)
}

fn find_tool_in(command: &str, extra_dirs: &[PathBuf], path_var: &OsStr) -> Option<PathBuf> {
    if command.is_empty() {
        return None;
    }

    if command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
        let path = Path::new(command);
        return path.is_file().then(|| path.to_path_buf());
    }

    extra_dirs
        .iter()
        .cloned()
        .chain(std::env::split_paths(path_var))
        .flat_map(|dir| candidates(&dir, command))
        .find(|candidate| candidate.is_file())
}

#[cfg(windows)]
fn candidates(dir: &Path, command: &str) -> Vec<PathBuf> {
    vec![dir.join(command), dir.join(format!("{command}.exe"))]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, command: &str) -> Vec<PathBuf> {
    vec![dir.join(command)]
}

/// Resolves `command` for spawning: the located path, or the bare name so the
/// spawn itself reports the missing binary.
#[must_use]
pub fn resolve_program(command: &str, extra_dirs: &[PathBuf]) -> PathBuf {
    find_tool(command, extra_dirs).unwrap_or_else(|| PathBuf::from(command))
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Toolbridge connects an editor's "go to declaration" and "format document"
//! actions to external command-line tools such as `godef` and `gofmt`.
//!
//! It translates editor positions into the byte offsets those tools expect,
//! runs them as subprocesses, and turns their output back into locations and
//! edits the editor can apply.

/// Tool invocation, position translation, and result shaping.
pub mod bridge;
/// Terminal output helpers for the command-line interface.
pub mod cli;
/// Layered configuration for the external tools.
pub mod config;
/// JSON-RPC server for editor hosts.
pub mod rpc;

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// JSON-RPC server over stdin/stdout.
mod server;
/// JSON-RPC messages and method parameters.
mod types;

pub use server::RpcServer;
pub use types::*;

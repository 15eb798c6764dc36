// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Cancellation signal for in-flight tool runs.
mod cancel;
/// Declaration lookup via an external tool.
mod declaration;
/// Whole-document formatting via an external tool.
mod format;
/// Editor-facing entry points.
mod handler;
/// Position and offset translation, tool output parsing.
pub mod position;
/// Subprocess execution and outcome classification.
pub mod process;
/// Tool executable discovery.
mod tools;

pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use declaration::{Declaration, DeclarationError, DeclarationResolver};
pub use format::{AUTO_FORMAT_TRIGGER_CHARACTERS, FormatError, Formatter, TextEdit, whole_buffer_edit};
pub use handler::{Bridge, FormattingOptions, Location, ToolStatus, path_to_uri};
pub use position::{
    LineInfo, LocationParseError, OffsetEncoding, Position, PositionError, Range, SourceLocation,
    TextBuffer, parse_location, to_offset,
};
pub use process::{ExitInfo, ToolInvocation, ToolOutcome, ToolOutput, invoke};
pub use tools::find_tool;

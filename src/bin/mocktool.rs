// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Stand-ins for `godef` and `gofmt` used by the integration tests.
//!
//! `mocktool godef` follows the declaration tool contract
//! (`-t -i -f <path> -o <offset>`, buffer on stdin) and reports the cursor
//! itself as the declaration, so a round trip exercises offset translation.
//! `mocktool fmt` strips trailing whitespace, which is idempotent.
//! Flags control timing and failure modes.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

/// Mock Go tools for integration testing.
#[derive(Parser, Debug)]
#[command(name = "mocktool")]
struct Args {
    #[command(subcommand)]
    tool: Tool,
}

#[derive(Subcommand, Debug)]
enum Tool {
    /// Declaration lookup.
    Godef(GodefArgs),
    /// Source formatting.
    Fmt(FmtArgs),
}

#[derive(clap::Args, Debug)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "CLI flags are inherently boolean"
)]
struct GodefArgs {
    /// Print the location as `path:line:col`.
    #[arg(short = 't')]
    terse: bool,

    /// Read the buffer from stdin.
    #[arg(short = 'i')]
    stdin: bool,

    /// File the buffer belongs to.
    #[arg(short = 'f')]
    file: PathBuf,

    /// Offset of the cursor in the buffer.
    #[arg(short = 'o')]
    offset: usize,

    /// Sleep before answering (milliseconds).
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Exit 1 with a message on stderr.
    #[arg(long)]
    fail: bool,

    /// Print something that is not a location.
    #[arg(long)]
    garbage: bool,

    /// Print nothing and exit 0.
    #[arg(long)]
    none: bool,
}

#[derive(clap::Args, Debug)]
struct FmtArgs {
    /// Exit 2 as if the file had a syntax error.
    #[arg(long)]
    fail: bool,

    /// File to format. Reads stdin when absent.
    path: Option<PathBuf>,
}

/// Maps a columns-convention offset back to a 1-based `(line, column)`.
/// Every line counts its characters plus one for the terminator.
fn position_at(text: &str, offset: usize) -> (usize, usize) {
    let mut remaining = offset;
    let mut line_count = 0;
    for (index, line) in text.split('\n').enumerate() {
        line_count = index + 1;
        let width = line.trim_end_matches('\r').chars().count() + 1;
        if remaining < width {
            return (index + 1, remaining + 1);
        }
        remaining -= width;
    }
    (line_count.max(1), 1)
}

/// Trims trailing whitespace from every line and ends with one newline.
fn tidy(source: &str) -> String {
    let mut out: String = source
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    out
}

fn run_godef(args: &GodefArgs) -> std::io::Result<ExitCode> {
    let buffer = if args.stdin {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&args.file)?
    };

    if args.delay_ms > 0 {
        std::thread::sleep(Duration::from_millis(args.delay_ms));
    }

    let mut stdout = std::io::stdout().lock();
    if args.fail {
        writeln!(std::io::stderr(), "godef: no identifier found")?;
        return Ok(ExitCode::from(1));
    }
    if args.garbage {
        writeln!(stdout, "{{\"declaration\": true}}")?;
        return Ok(ExitCode::SUCCESS);
    }
    if args.none {
        return Ok(ExitCode::SUCCESS);
    }

    let (line, column) = position_at(&buffer, args.offset);
    if args.terse {
        writeln!(stdout, "{}:{line}:{column}", args.file.display())?;
    } else {
        writeln!(stdout, "{}:{line}:{column}\nfunc declared here", args.file.display())?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_fmt(args: &FmtArgs) -> std::io::Result<ExitCode> {
    let source = match &args.path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            source
        }
    };

    if args.fail || source.contains("SYNTAX_ERROR") {
        let name = args
            .path
            .as_ref()
            .map_or_else(|| "<standard input>".to_string(), |p| p.display().to_string());
        writeln!(std::io::stderr(), "{name}:1:1: expected declaration")?;
        return Ok(ExitCode::from(2));
    }

    std::io::stdout().lock().write_all(tidy(&source).as_bytes())?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = match &args.tool {
        Tool::Godef(godef) => run_godef(godef),
        Tool::Fmt(fmt) => run_fmt(fmt),
    };
    result.unwrap_or_else(|e| {
        let _ = writeln!(std::io::stderr(), "mocktool: {e}");
        ExitCode::from(3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_at_inverts_columns_offset() {
        let text = "package main\n\nfunc main() {\n";
        assert_eq!(position_at(text, 0), (1, 1));
        assert_eq!(position_at(text, 13), (2, 1));
        assert_eq!(position_at(text, 14), (3, 1));
        assert_eq!(position_at(text, 19), (3, 6));
    }

    #[test]
    fn test_position_at_past_end() {
        assert_eq!(position_at("ab", 99), (1, 1));
        assert_eq!(position_at("", 0), (1, 1));
    }

    #[test]
    fn test_tidy_is_idempotent() {
        let once = tidy("package main  \n\nfunc main() {\t\n}\n\n\n");
        assert_eq!(once, "package main\n\nfunc main() {\n}\n");
        assert_eq!(tidy(&once), once);
    }
}

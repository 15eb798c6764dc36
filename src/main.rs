// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Toolbridge server and CLI.
//!
//! Runs as a JSON-RPC server for editor hosts, or answers a single
//! declaration or formatting request from the command line.

#![allow(clippy::print_stdout, reason = "CLI tool needs to output to stdout")]

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use toolbridge::bridge::{Bridge, CancelSignal, FormattingOptions, Position, cancellation};
use toolbridge::cli::{ColorConfig, terminal_width, truncate_left};
use toolbridge::config::Config;
use toolbridge::rpc::RpcServer;

/// Command-line arguments for Toolbridge.
#[derive(Parser, Debug)]
#[command(name = "toolbridge")]
#[command(about = "Bridges editor declaration lookup and formatting to external Go tools")]
#[command(version = env!("TOOLBRIDGE_VERSION"))]
struct Args {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Subcommands supported by Toolbridge.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the JSON-RPC server on stdin/stdout (default if no subcommand given).
    Serve,

    /// Print where the symbol at a position is declared, as `path:line:col`.
    /// Prints nothing when the tool finds no declaration.
    Definition {
        /// File containing the symbol.
        #[arg(long)]
        file: PathBuf,

        /// Line of the symbol, 1-based.
        #[arg(long)]
        line: u32,

        /// Column of the symbol, 1-based.
        #[arg(long)]
        column: u32,

        /// Read the buffer contents from stdin instead of the file.
        #[arg(long)]
        stdin: bool,
    },

    /// Print the reformatted contents of a file.
    Format {
        /// File to format.
        #[arg(long)]
        file: PathBuf,
    },

    /// Check that the configured tools can be found.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        nocolor: bool,
    },
}

/// Entry point for the Toolbridge binary.
///
/// # Errors
///
/// Returns an error if the subcommand fails.
fn main() -> Result<()> {
    let args = Args::parse();
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(args));

    // A stdin read may still be parked on a blocking thread after shutdown
    runtime.shutdown_background();
    result
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        None | Some(Command::Serve) => run_server(args.config).await,
        Some(Command::Definition {
            file,
            line,
            column,
            stdin,
        }) => run_definition(args.config, &file, Position::new(line, column), stdin).await,
        Some(Command::Format { file }) => run_format(args.config, &file).await,
        Some(Command::Doctor { nocolor }) => run_doctor(args.config, nocolor),
    }
}

/// Routes logs to stderr; stdout carries protocol messages and command output.
fn init_logging(default_directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Runs the JSON-RPC server until stdin closes, `shutdown` arrives, or a
/// termination signal is received.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or stdio fails.
async fn run_server(config_file: Option<PathBuf>) -> Result<()> {
    init_logging("toolbridge=info")?;

    let config = Config::load(config_file)?;
    info!(
        "Using {} for declarations and {} for formatting",
        config.declaration.command, config.format.command
    );

    let server = RpcServer::new(Bridge::new(config));

    tokio::select! {
        res = server.run(tokio::io::stdin(), tokio::io::stdout()) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    }
}

/// Cancels in-flight tool runs when the user interrupts a one-shot command.
fn cancel_on_interrupt() -> CancelSignal {
    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, killing tool");
            handle.cancel();
        }
    });
    signal
}

/// Resolves `file` to an absolute path so relative tool output has a base.
fn absolute_file(file: &Path) -> Result<PathBuf> {
    std::path::absolute(file).with_context(|| format!("Invalid path: {}", file.display()))
}

/// Prints the declaration site for `position` in `file`.
///
/// # Errors
///
/// Returns an error if the buffer cannot be read, the position is outside it,
/// or the tool output cannot be parsed.
async fn run_definition(
    config_file: Option<PathBuf>,
    file: &Path,
    position: Position,
    from_stdin: bool,
) -> Result<()> {
    init_logging("toolbridge=warn")?;

    let config = Config::load(config_file)?;
    let path = absolute_file(file)?;

    let text = if from_stdin {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read buffer from stdin")?;
        text
    } else {
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    let bridge = Bridge::new(config);
    let location = bridge
        .resolve_declaration(&path, &text, position, &cancel_on_interrupt())
        .await?;

    if let Some(location) = location {
        println!(
            "{}:{}:{}",
            location.path.display(),
            location.range.start_line,
            location.range.start_col
        );
    }
    Ok(())
}

/// Prints the reformatted contents of `file` without modifying it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the formatter fails.
async fn run_format(config_file: Option<PathBuf>, file: &Path) -> Result<()> {
    init_logging("toolbridge=warn")?;

    let config = Config::load(config_file)?;
    let path = absolute_file(file)?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let bridge = Bridge::new(config);
    let edits = bridge
        .format_document(
            &path,
            &text,
            &FormattingOptions::default(),
            &cancel_on_interrupt(),
        )
        .await?;

    let edit = edits
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Formatter produced no edit"))?;
    print!("{}", edit.replacement_text);
    Ok(())
}

/// Run the doctor command: report configuration and where each tool resolves.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
fn run_doctor(config_file: Option<PathBuf>, nocolor: bool) -> Result<()> {
    init_logging("toolbridge=warn")?;
    let colors = ColorConfig::new(nocolor);

    println!("Toolbridge {}", env!("TOOLBRIDGE_VERSION"));
    println!();

    let config_source = config_file
        .as_ref()
        .map_or_else(|| "default paths".to_string(), |p| p.display().to_string());
    let config = Config::load(config_file)?;

    println!("{} {}", colors.bold("Config:"), config_source);
    println!(
        "{} {:?} offsets, {:?} input",
        colors.bold("Mode:  "),
        config.declaration.offset_encoding,
        config.format.input,
    );
    if !config.tools_path.is_empty() {
        println!(
            "{} {}",
            colors.bold("Tools: "),
            config
                .tools_path
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    println!();

    let statuses = Bridge::new(config).tool_status();
    let max_role_width = statuses.iter().map(|s| s.role.len()).max().unwrap_or(10);
    let max_cmd_width = statuses
        .iter()
        .map(|s| s.command.len())
        .max()
        .unwrap_or(10);
    let path_width = terminal_width().saturating_sub(max_role_width + max_cmd_width + 8);

    let mut missing = 0;
    for status in &statuses {
        let role_display = format!("{:<max_role_width$}", status.role);
        let cmd_display = format!("{:<max_cmd_width$}", status.command);

        match &status.resolved {
            Some(path) => println!(
                "{}  {}  {}",
                role_display,
                cmd_display,
                colors.green(&format!(
                    "✓ {}",
                    truncate_left(&path.to_string_lossy(), path_width)
                )),
            ),
            None => {
                missing += 1;
                println!(
                    "{}  {}  {}",
                    role_display,
                    cmd_display,
                    colors.red("✗ command not found"),
                );
            }
        }
    }

    if missing > 0 {
        println!();
        println!(
            "{}",
            colors.yellow("Install missing tools or add their directory to tools_path.")
        );
    }

    Ok(())
}

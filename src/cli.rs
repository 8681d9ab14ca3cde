// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskchain`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskchain",
    version,
    about = "Run a chain of steps one at a time on a single main loop.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the chain file (TOML).
    ///
    /// Default: `Taskchain.toml` in the current working directory, or the
    /// built-in demo chain if that file does not exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKCHAIN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the chain, but don't run it.
    #[arg(long)]
    pub dry_run: bool,

    /// Cancel the chain after this many milliseconds (overrides
    /// `[chain].cancel_after_ms`).
    #[arg(long, value_name = "MS")]
    pub cancel_after_ms: Option<u64>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

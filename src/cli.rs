// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `execmon`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "execmon",
    version,
    about = "Run a command locally, as another user, in a container or over SSH, and stream its output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Execmon.toml` in the current working directory. A missing
    /// default file means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Execmon.toml")]
    pub config: PathBuf,

    /// Run on a `[target.<name>]` from the config instead of locally.
    #[arg(long, value_name = "NAME")]
    pub target: Option<String>,

    /// Record identifier. Generated if omitted.
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Retire the record once this file exists, even after the command
    /// itself returned.
    #[arg(long, value_name = "PATH")]
    pub done_marker: Option<PathBuf>,

    /// How often to poll the record for new output, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub poll_interval: u64,

    /// Print the final record snapshot as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Print the command vector that would run, without running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EXECMON_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// The command to run.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
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

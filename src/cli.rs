// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procward`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procward",
    version,
    about = "Supervise long-running processes; speaks line-delimited JSON on stdin/stdout.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the settings file (TOML). Missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = "Procward.toml")]
    pub settings: PathBuf,

    /// Override `[supervisor].state_file`.
    #[arg(long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCWARD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate settings and state, print the definitions, start
    /// nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore `autoStartOnOpen` for this run.
    #[arg(long)]
    pub no_auto_start: bool,
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

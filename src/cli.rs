// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procgate`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procgate",
    version,
    about = "Run a batch of external processes with bounded concurrency.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the batch file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Procgate.toml")]
    pub batch: String,

    /// Override `[config].parallelism` from the batch file.
    #[arg(long, value_name = "N")]
    pub parallelism: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCGATE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the batch, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
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

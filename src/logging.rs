// src/logging.rs

//! Logging setup for `procgate` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. `--log-level`, applied to `procgate` itself (other crates stay at `warn`);
//! 2. `PROCGATE_LOG`, parsed as an `EnvFilter` directive list, so
//!    `PROCGATE_LOG=info,procgate::exec=debug` traces only the executor;
//! 3. `info`.
//!
//! Logs go to STDERR; stdout carries task output only.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "PROCGATE_LOG";

const DEFAULT_DIRECTIVES: &str = "info";

/// Initialise the global logging subscriber. Call once at startup.
///
/// A malformed `PROCGATE_LOG` is an error rather than silently ignored.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Build the filter from the CLI flag and the raw `PROCGATE_LOG` value.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(format!(
            "warn,procgate={}",
            level_directive(level)
        )));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV} value '{directives}'")),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVES)),
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ProcgateError`] covers setup problems (batch file, CLI, bad limits).
//! - [`RunError`] is what a single process run hands to its callback.
//! - [`GateError`] is returned when a gate slot cannot be obtained.
//! - [`TaskError`] is the single representative error reported by `join`.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcgateError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ProcgateError>;

/// How a process ended when that ending counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Killed by the given signal (Unix only).
    Signal(i32),
    /// The OS reported no exit code and no signal.
    NoExitCode,
    /// Exited with a non-zero code without writing anything to stdout.
    EmptyOutput(i32),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Signal(sig) => write!(f, "was terminated by signal {sig}"),
            Termination::NoExitCode => write!(f, "was terminated"),
            Termination::EmptyOutput(code) => {
                write!(f, "exited with status {code} but stdout was empty")
            }
        }
    }
}

/// Failure of a single process run.
///
/// A non-zero exit with non-empty stdout is *not* represented here: that is
/// the tool reporting findings, and the run succeeds with its output.
#[derive(Error, Debug)]
pub enum RunError {
    /// The process could not be started, fed, drained or waited on.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{exe} {termination}. stderr: {stderr:?}")]
    TerminatedAbnormally {
        exe: String,
        termination: Termination,
        stderr: String,
    },

    #[error("{exe} was killed because the run was cancelled")]
    Cancelled { exe: String },

    #[error("{exe} did not finish within {timeout:?} and was killed")]
    TimedOut { exe: String, timeout: Duration },

    /// The task never got a gate slot, so no process was started.
    #[error("{exe} was not started: {source}")]
    NotAdmitted {
        exe: String,
        #[source]
        source: GateError,
    },
}

impl RunError {
    pub(crate) fn transport(context: impl Into<String>, source: std::io::Error) -> Self {
        RunError::Transport {
            context: context.into(),
            source,
        }
    }

    /// True for failures caused by the process itself rather than by the
    /// machinery around it.
    pub fn is_abnormal_termination(&self) -> bool {
        matches!(self, RunError::TerminatedAbnormally { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RunError::Transport { .. })
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("waiting for a process slot was cancelled")]
    Cancelled,

    #[error("the concurrency gate has been closed")]
    Closed,
}

/// The one error `join` reports for a whole batch.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A callback (or any other unit of work) returned an error.
    #[error(transparent)]
    Callback(#[from] anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_messages_name_the_cause() {
        let err = RunError::TerminatedAbnormally {
            exe: "shellcheck".to_string(),
            termination: Termination::EmptyOutput(2),
            stderr: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "shellcheck exited with status 2 but stdout was empty. stderr: \"boom\""
        );

        let err = RunError::TerminatedAbnormally {
            exe: "pyflakes".to_string(),
            termination: Termination::Signal(9),
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal 9"));
        assert!(err.is_abnormal_termination());
    }

    #[test]
    fn transport_error_keeps_its_cause() {
        use std::error::Error as _;

        let err = RunError::transport(
            "could not write to stdin of cat process",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        );
        assert!(err.is_transport());
        let source = err.source().expect("transport error has a source");
        assert_eq!(source.to_string(), "pipe closed");
    }

    #[test]
    fn callback_error_is_transparent() {
        let err = TaskError::from(anyhow::anyhow!("lint failed for a.sh"));
        assert_eq!(err.to_string(), "lint failed for a.sh");
    }
}

// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::exec::Invocation;

/// Batch file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// parallelism = 4
/// timeout = "30s"
///
/// [[task]]
/// name = "lint-a"
/// exe = "shellcheck"
/// args = ["--norc", "-f", "json", "-"]
/// stdin = "echo $foo"
/// ```
///
/// Both sections are optional for serde; validation requires at least one
/// task.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBatchFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of processes running at once.
    ///
    /// If `None`, the number of available CPUs is used.
    #[serde(default)]
    pub parallelism: Option<usize>,

    /// Per-process timeout such as `"500ms"`, `"30s"` or `"2m"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Display name; defaults to `task-<index>`.
    #[serde(default)]
    pub name: Option<String>,

    /// Executable, resolved through `PATH`.
    pub exe: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Text written to the process's stdin.
    #[serde(default)]
    pub stdin: String,
}

/// Validated batch, ready to hand to the manager.
#[derive(Debug, Clone)]
pub struct BatchFile {
    pub parallelism: usize,
    pub timeout: Option<Duration>,
    pub tasks: Vec<BatchTask>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTask {
    pub name: String,
    pub invocation: Invocation,
}

impl BatchFile {
    pub(crate) fn new_unchecked(
        parallelism: usize,
        timeout: Option<Duration>,
        tasks: Vec<BatchTask>,
    ) -> Self {
        Self {
            parallelism,
            timeout,
            tasks,
        }
    }
}

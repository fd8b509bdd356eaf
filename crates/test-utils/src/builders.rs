#![allow(dead_code)]

use procgate::config::{BatchFile, ConfigSection, RawBatchFile, TaskConfig};

/// Builder for `BatchFile` to simplify test setup.
pub struct BatchFileBuilder {
    raw: RawBatchFile,
}

impl BatchFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawBatchFile {
                config: ConfigSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn parallelism(mut self, n: usize) -> Self {
        self.raw.config.parallelism = Some(n);
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.raw.config.timeout = Some(timeout.to_string());
        self
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.raw.task.push(task);
        self
    }

    pub fn raw(self) -> RawBatchFile {
        self.raw
    }

    pub fn build(self) -> BatchFile {
        BatchFile::try_from(self.raw).expect("Failed to build valid batch from builder")
    }
}

impl Default for BatchFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(exe: &str) -> Self {
        Self {
            task: TaskConfig {
                name: None,
                exe: exe.to_string(),
                args: vec![],
                stdin: String::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = Some(name.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.task.args.push(arg.to_string());
        self
    }

    pub fn stdin(mut self, input: &str) -> Self {
        self.task.stdin = input.to_string();
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

// src/config/validate.rs

use std::collections::HashSet;
use std::num::NonZero;
use std::time::Duration;

use crate::config::model::{BatchFile, BatchTask, RawBatchFile};
use crate::errors::{ProcgateError, Result};
use crate::exec::Invocation;

impl TryFrom<RawBatchFile> for BatchFile {
    type Error = ProcgateError;

    fn try_from(raw: RawBatchFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let parallelism = resolve_parallelism(raw.config.parallelism)?;
        let timeout = resolve_timeout(raw.config.timeout.as_deref())?;
        let tasks = build_tasks(raw)?;
        Ok(BatchFile::new_unchecked(parallelism, timeout, tasks))
    }
}

/// Parallelism used when none is configured: one process per available CPU.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZero::get)
        .unwrap_or(1)
}

fn ensure_has_tasks(raw: &RawBatchFile) -> Result<()> {
    if raw.task.is_empty() {
        return Err(ProcgateError::ConfigError(
            "batch must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn resolve_parallelism(configured: Option<usize>) -> Result<usize> {
    match configured {
        Some(0) => Err(ProcgateError::ConfigError(
            "[config].parallelism must be >= 1 (got 0)".to_string(),
        )),
        Some(n) => Ok(n),
        None => Ok(default_parallelism()),
    }
}

fn resolve_timeout(configured: Option<&str>) -> Result<Option<Duration>> {
    let Some(s) = configured else {
        return Ok(None);
    };

    let timeout = parse_duration(s)
        .map_err(|e| ProcgateError::ConfigError(format!("[config].timeout: {e}")))?;

    if timeout.is_zero() {
        return Err(ProcgateError::ConfigError(
            "[config].timeout must be greater than zero".to_string(),
        ));
    }

    Ok(Some(timeout))
}

fn build_tasks(raw: RawBatchFile) -> Result<Vec<BatchTask>> {
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(raw.task.len());

    for (idx, task) in raw.task.into_iter().enumerate() {
        let name = task.name.unwrap_or_else(|| format!("task-{idx}"));

        if task.exe.trim().is_empty() {
            return Err(ProcgateError::ConfigError(format!(
                "task '{name}' has an empty `exe`"
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(ProcgateError::ConfigError(format!(
                "duplicate task name '{name}'"
            )));
        }

        let invocation = Invocation::new(task.exe)
            .args(task.args)
            .stdin(task.stdin);
        tasks.push(BatchTask { name, invocation });
    }

    Ok(tasks)
}

/// Parse durations like `"500ms"`, `"30s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60, s),
        "h" => scaled_secs(value, 60 * 60, s),
        unit => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}

fn scaled_secs(value: u64, factor: u64, raw: &str) -> std::result::Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{raw}' is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{ConfigSection, TaskConfig};

    fn task(exe: &str) -> TaskConfig {
        TaskConfig {
            name: None,
            exe: exe.to_string(),
            args: vec![],
            stdin: String::new(),
        }
    }

    fn raw(config: ConfigSection, task: Vec<TaskConfig>) -> RawBatchFile {
        RawBatchFile { config, task }
    }

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").unwrap_err().contains("unsupported"));
        assert!(
            parse_duration("999999999999999999m")
                .unwrap_err()
                .contains("out of range")
        );
        assert!(parse_duration("18446744073709551615h").is_err());
    }

    #[test]
    fn unnamed_tasks_get_index_names() {
        let batch =
            BatchFile::try_from(raw(ConfigSection::default(), vec![task("cat"), task("cat")]))
                .unwrap();
        let names: Vec<_> = batch.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["task-0", "task-1"]);
        assert!(batch.parallelism >= 1);
        assert_eq!(batch.timeout, None);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = ConfigSection {
            parallelism: Some(2),
            timeout: Some("0s".to_string()),
        };
        let err = BatchFile::try_from(raw(cfg, vec![task("cat")])).unwrap_err();
        assert!(matches!(err, ProcgateError::ConfigError(msg) if msg.contains("timeout")));
    }

    #[test]
    fn empty_exe_is_rejected() {
        let err = BatchFile::try_from(raw(ConfigSection::default(), vec![task("  ")])).unwrap_err();
        assert!(matches!(err, ProcgateError::ConfigError(msg) if msg.contains("empty `exe`")));
    }
}

// src/exec/runner.rs

//! Single process runner.
//!
//! Spawns one process, feeds it stdin, drains stdout/stderr and classifies
//! how it ended. The classification rules are:
//!
//! 1. spawn / pipe / wait failures are transport errors;
//! 2. a signal or a missing exit code is an abnormal termination;
//! 3. a non-zero exit with empty stdout is an abnormal termination;
//! 4. a non-zero exit with stdout is the tool reporting findings (success);
//! 5. exit code zero is success.

use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{RunError, Termination};

use super::backend::ProcessBackend;

/// One external process invocation: what to run and what to feed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub exe: String,
    pub args: Vec<String>,
    pub stdin: Vec<u8>,
}

impl Invocation {
    pub fn new(exe: impl Into<String>) -> Self {
        Self {
            exe: exe.into(),
            args: Vec::new(),
            stdin: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = input.into();
        self
    }
}

/// How a process that could be waited on ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success(Vec<u8>),
    /// Non-zero exit with output: the tool ran fine and reported issues.
    FindingsReported { output: Vec<u8>, exit_code: i32 },
    TerminatedAbnormally {
        termination: Termination,
        stderr: String,
    },
}

impl ProcessOutcome {
    /// Collapse the outcome into the `(output, error)` contract handed to
    /// callbacks. Findings are *not* an error.
    pub fn into_result(self, exe: &str) -> Result<Vec<u8>, RunError> {
        match self {
            ProcessOutcome::Success(output) => Ok(output),
            ProcessOutcome::FindingsReported { output, .. } => Ok(output),
            ProcessOutcome::TerminatedAbnormally {
                termination,
                stderr,
            } => Err(RunError::TerminatedAbnormally {
                exe: exe.to_string(),
                termination,
                stderr,
            }),
        }
    }
}

/// Classify an exit status together with the captured streams.
pub fn classify(status: ExitStatus, stdout: Vec<u8>, stderr: &[u8]) -> ProcessOutcome {
    let stderr_text = || String::from_utf8_lossy(stderr).into_owned();

    let code = match status.code() {
        Some(code) if code >= 0 => code,
        _ => {
            return ProcessOutcome::TerminatedAbnormally {
                termination: termination_without_code(status),
                stderr: stderr_text(),
            };
        }
    };

    if code == 0 {
        return ProcessOutcome::Success(stdout);
    }

    if stdout.is_empty() {
        return ProcessOutcome::TerminatedAbnormally {
            termination: Termination::EmptyOutput(code),
            stderr: stderr_text(),
        };
    }

    ProcessOutcome::FindingsReported {
        output: stdout,
        exit_code: code,
    }
}

#[cfg(unix)]
fn termination_without_code(status: ExitStatus) -> Termination {
    use std::os::unix::process::ExitStatusExt;

    status
        .signal()
        .map(Termination::Signal)
        .unwrap_or(Termination::NoExitCode)
}

#[cfg(not(unix))]
fn termination_without_code(_status: ExitStatus) -> Termination {
    Termination::NoExitCode
}

/// Production backend: runs real OS processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct RealProcessRunner {
    timeout: Option<Duration>,
}

impl RealProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any process that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one process to completion and classify the result.
    pub async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, RunError> {
        let exe = invocation.exe.as_str();

        debug!(
            exe = %exe,
            args = ?invocation.args,
            stdin_len = invocation.stdin.len(),
            "spawning process"
        );

        // stderr is piped, never inherited: it only feeds error messages.
        let mut child = Command::new(exe)
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunError::transport(format!("could not start {exe} process"), e))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            RunError::transport(
                format!("could not make stdin pipe for {exe} process"),
                missing_pipe("stdin"),
            )
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            RunError::transport(
                format!("could not capture stdout of {exe} process"),
                missing_pipe("stdout"),
            )
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            RunError::transport(
                format!("could not capture stderr of {exe} process"),
                missing_pipe("stderr"),
            )
        })?;

        let timeout = self.timeout;

        tokio::select! {
            res = exchange(&mut child, exe, stdin, &invocation.stdin, stdout, stderr) => {
                let (status, stdout, stderr) = res?;
                info!(
                    exe = %exe,
                    exit_code = status.code().unwrap_or(-1),
                    stdout_len = stdout.len(),
                    "process exited"
                );
                classify(status, stdout, &stderr).into_result(exe)
            }

            _ = cancel.cancelled() => {
                info!(exe = %exe, "run cancelled; killing process");
                kill(&mut child, exe).await;
                Err(RunError::Cancelled { exe: exe.to_string() })
            }

            _ = sleep_or_forever(timeout) => {
                let timeout = timeout.unwrap_or_default();
                warn!(exe = %exe, ?timeout, "process timed out; killing it");
                kill(&mut child, exe).await;
                Err(RunError::TimedOut { exe: exe.to_string(), timeout })
            }
        }
    }
}

impl ProcessBackend for RealProcessRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RunError>> + Send + 'a>> {
        Box::pin(RealProcessRunner::run(self, invocation, cancel))
    }
}

/// Feed stdin while draining stdout and stderr, then reap the child.
///
/// Writing and reading happen concurrently so a child that produces output
/// before consuming all of its input cannot deadlock against us. A child that
/// stops reading early (exits, or closes stdin) is not a transport failure:
/// its exit status still decides the outcome.
async fn exchange(
    child: &mut Child,
    exe: &str,
    stdin: ChildStdin,
    input: &[u8],
    stdout: impl AsyncRead + Unpin,
    stderr: impl AsyncRead + Unpin,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), RunError> {
    let (written, stdout, stderr) = tokio::join!(
        write_stdin(stdin, input, exe),
        read_all(stdout),
        read_all(stderr)
    );

    written
        .map_err(|e| RunError::transport(format!("could not write to stdin of {exe} process"), e))?;
    let stdout = stdout
        .map_err(|e| RunError::transport(format!("could not read stdout of {exe} process"), e))?;
    let stderr = stderr
        .map_err(|e| RunError::transport(format!("could not read stderr of {exe} process"), e))?;

    let status = child
        .wait()
        .await
        .map_err(|e| RunError::transport(format!("could not wait for {exe} process"), e))?;

    Ok((status, stdout, stderr))
}

/// The pipe is owned here, so it is closed on every return path; the child
/// sees EOF once this returns.
///
/// `BrokenPipe` means the child closed its end before taking all input; the
/// exit status decides the outcome, so it is only logged.
async fn write_stdin(mut stdin: ChildStdin, input: &[u8], exe: &str) -> std::io::Result<()> {
    let res = async {
        stdin.write_all(input).await?;
        stdin.shutdown().await
    }
    .await;

    match res {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!(exe = %exe, error = %e, "child closed stdin before reading all input");
            Ok(())
        }
        other => other,
    }
}

async fn read_all(mut reader: impl AsyncRead + Unpin) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

async fn kill(child: &mut Child, exe: &str) {
    if let Err(e) = child.kill().await {
        warn!(exe = %exe, error = %e, "failed to kill child process");
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

fn missing_pipe(which: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("{which} pipe was not captured"),
    )
}

// src/exec/manager.rs

//! Concurrent process manager.
//!
//! Composes the gate, the task group and a [`ProcessBackend`]:
//!
//! - `submit` waits for a gate slot, then spawns a unit that runs the process,
//!   releases the slot and only then invokes the caller's callback;
//! - `join` waits for every unit and reports the first callback error.
//!
//! Running many linters at once exhausts OS resources (process creation hangs
//! on macOS, "too many open files" on pipes), hence the single ceiling.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{Result, RunError, TaskError};

use super::backend::ProcessBackend;
use super::gate::ConcurrencyGate;
use super::group::TaskGroup;
use super::runner::{Invocation, RealProcessRunner};

pub struct ConcurrentProcessManager<B: ProcessBackend = RealProcessRunner> {
    backend: Arc<B>,
    gate: ConcurrencyGate,
    group: TaskGroup,
    cancel: CancellationToken,
}

impl<B: ProcessBackend> fmt::Debug for ConcurrentProcessManager<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentProcessManager")
            .field("gate", &self.gate)
            .field("outstanding", &self.group.outstanding())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ConcurrentProcessManager<RealProcessRunner> {
    /// Manager running real OS processes, at most `parallelism` at a time.
    pub fn new(parallelism: usize) -> Result<Self> {
        Self::with_backend(parallelism, RealProcessRunner::new())
    }

    /// Kill any process that runs longer than `timeout`.
    ///
    /// Applies to tasks submitted after this call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        let runner = RealProcessRunner::clone(&self.backend).with_timeout(timeout);
        self.backend = Arc::new(runner);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.backend.timeout()
    }
}

impl<B: ProcessBackend> ConcurrentProcessManager<B> {
    pub fn with_backend(parallelism: usize, backend: B) -> Result<Self> {
        let gate = ConcurrencyGate::new(parallelism)?;
        Ok(Self {
            backend: Arc::new(backend),
            gate,
            group: TaskGroup::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// The token threaded through every gate acquire and process run.
    ///
    /// Cancelling it fails pending acquires and kills running processes;
    /// each affected callback still runs once with the cancellation error.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop admitting tasks without touching running ones.
    ///
    /// Queued and later submissions get [`RunError::NotAdmitted`] with
    /// [`GateError::Closed`](crate::errors::GateError::Closed); processes
    /// already running finish normally.
    pub fn close(&self) {
        self.gate.close();
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Run `exe args...` with `input` on stdin once a slot is free, then hand
    /// the result to `on_complete`.
    pub async fn submit<F>(
        &mut self,
        exe: impl Into<String>,
        args: Vec<String>,
        input: impl Into<Vec<u8>>,
        on_complete: F,
    ) where
        F: FnOnce(std::result::Result<Vec<u8>, RunError>) -> anyhow::Result<()> + Send + 'static,
    {
        let invocation = Invocation::new(exe).args(args).stdin(input);
        self.submit_invocation(invocation, on_complete).await;
    }

    /// Same as [`submit`](Self::submit) for a prepared [`Invocation`].
    ///
    /// Suspends only while waiting for a gate slot.
    pub async fn submit_invocation<F>(&mut self, invocation: Invocation, on_complete: F)
    where
        F: FnOnce(std::result::Result<Vec<u8>, RunError>) -> anyhow::Result<()> + Send + 'static,
    {
        let permit = match self.gate.acquire(&self.cancel).await {
            Ok(permit) => permit,
            Err(source) => {
                info!(exe = %invocation.exe, error = %source, "task not admitted");
                let result = Err(RunError::NotAdmitted {
                    exe: invocation.exe,
                    source,
                });
                self.group.spawn(async move { on_complete(result) });
                return;
            }
        };

        debug!(exe = %invocation.exe, held = self.gate.held(), "task admitted");

        let backend = Arc::clone(&self.backend);
        let cancel = self.cancel.clone();

        self.group.spawn(async move {
            let result = backend.run(&invocation, &cancel).await;
            // Free the slot before the callback so queued tasks can start
            // while it runs.
            permit.release();
            on_complete(result)
        });
    }

    /// Wait for every submitted task and its callback.
    ///
    /// Returns the first callback error to land, if any.
    pub async fn join(self) -> std::result::Result<(), TaskError> {
        let res = self.group.wait().await;
        match &res {
            Ok(()) => debug!("all tasks finished"),
            Err(err) => info!(error = %err, "tasks finished with an error"),
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::errors::{GateError, ProcgateError};

    /// Echoes stdin back, or fails for executables named "fail".
    struct EchoBackend;

    impl ProcessBackend for EchoBackend {
        fn run<'a>(
            &'a self,
            invocation: &'a Invocation,
            _cancel: &'a CancellationToken,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<Vec<u8>, RunError>> + Send + 'a>>
        {
            Box::pin(async move {
                if invocation.exe == "fail" {
                    return Err(RunError::TerminatedAbnormally {
                        exe: invocation.exe.clone(),
                        termination: crate::errors::Termination::EmptyOutput(2),
                        stderr: String::new(),
                    });
                }
                Ok(invocation.stdin.clone())
            })
        }
    }

    #[test]
    fn zero_parallelism_fails_fast() {
        let res = ConcurrentProcessManager::with_backend(0, EchoBackend);
        assert!(matches!(res, Err(ProcgateError::ConfigError(_))));
    }

    #[tokio::test]
    async fn callbacks_receive_backend_output() {
        let mut mgr = ConcurrentProcessManager::with_backend(2, EchoBackend).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let seen = Arc::clone(&seen);
            mgr.submit("echo", vec![], format!("in-{i}"), move |res| {
                seen.lock().unwrap().push(String::from_utf8(res?)?);
                Ok(())
            })
            .await;
        }

        mgr.join().await.unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["in-0", "in-1", "in-2", "in-3"]);
    }

    #[tokio::test]
    async fn callback_decides_whether_a_run_error_fails_the_batch() {
        let mut mgr = ConcurrentProcessManager::with_backend(1, EchoBackend).unwrap();

        // Swallowed by the callback: not a batch failure.
        mgr.submit("fail", vec![], "", |res| {
            assert!(res.unwrap_err().is_abnormal_termination());
            Ok(())
        })
        .await;
        assert!(mgr.join().await.is_ok());

        let mut mgr = ConcurrentProcessManager::with_backend(1, EchoBackend).unwrap();
        mgr.submit("fail", vec![], "", |res| res.map(|_| ()).map_err(Into::into))
            .await;
        let err = mgr.join().await.unwrap_err();
        assert!(err.to_string().contains("exited with status 2"));
    }

    #[tokio::test]
    async fn cancelled_manager_still_invokes_callbacks() {
        let mut mgr = ConcurrentProcessManager::with_backend(1, EchoBackend).unwrap();
        mgr.cancellation_token().cancel();

        let calls = Arc::new(Mutex::new(0));
        {
            let calls = Arc::clone(&calls);
            mgr.submit("echo", vec![], "x", move |res| {
                *calls.lock().unwrap() += 1;
                match res {
                    Err(RunError::NotAdmitted { source, .. }) => {
                        assert_eq!(source, GateError::Cancelled);
                        Ok(())
                    }
                    other => anyhow::bail!("unexpected result: {other:?}"),
                }
            })
            .await;
        }

        mgr.join().await.unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn closed_manager_refuses_new_tasks() {
        let mut mgr = ConcurrentProcessManager::with_backend(2, EchoBackend).unwrap();
        mgr.close();
        assert!(mgr.gate().is_closed());

        mgr.submit("echo", vec![], "x", |res| match res {
            Err(RunError::NotAdmitted { source, .. }) => {
                assert_eq!(source, GateError::Closed);
                Ok(())
            }
            other => anyhow::bail!("unexpected result: {other:?}"),
        })
        .await;

        mgr.join().await.unwrap();
    }
}

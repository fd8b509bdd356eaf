use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procgate::errors::{RunError, Termination};
use procgate::exec::{CancellationToken, Invocation, ProcessBackend};

/// A fake backend that:
/// - records which executables were "run"
/// - tracks how many runs overlap (current and peak)
/// - echoes stdin back as stdout after an optional delay
/// - fails with an abnormal termination for executables named `fail`.
#[derive(Clone, Default)]
pub struct FakeBackend {
    delay: Duration,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Handle for inspecting the backend after it was moved into a manager.
    pub fn stats(&self) -> FakeStats {
        FakeStats {
            running: Arc::clone(&self.running),
            peak: Arc::clone(&self.peak),
            executed: Arc::clone(&self.executed),
        }
    }
}

#[derive(Clone)]
pub struct FakeStats {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeStats {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl ProcessBackend for FakeBackend {
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RunError>> + Send + 'a>> {
        Box::pin(async move {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.executed.lock().unwrap().push(invocation.exe.clone());

            let res = tokio::select! {
                _ = cancel.cancelled() => Err(RunError::Cancelled { exe: invocation.exe.clone() }),
                _ = tokio::time::sleep(self.delay) => {
                    if invocation.exe == "fail" {
                        Err(RunError::TerminatedAbnormally {
                            exe: invocation.exe.clone(),
                            termination: Termination::EmptyOutput(2),
                            stderr: String::new(),
                        })
                    } else {
                        Ok(invocation.stdin.clone())
                    }
                }
            };

            self.running.fetch_sub(1, Ordering::SeqCst);
            res
        })
    }
}

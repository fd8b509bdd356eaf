// src/exec/group.rs

//! Task group with a first-error-wins completion barrier.
//!
//! Every unit spawned into the group runs to completion; a failing unit never
//! cancels its siblings. The first error to *land* is kept in a set-once cell
//! and later errors are dropped (after a debug log). `wait` returns only once
//! every unit has finished.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::task::JoinSet;
use tracing::debug;

use crate::errors::TaskError;

#[derive(Debug, Default)]
pub struct TaskGroup {
    units: JoinSet<()>,
    outstanding: Arc<AtomicUsize>,
    first_error: Arc<OnceLock<TaskError>>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and start one unit of work.
    pub fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let outstanding = Arc::clone(&self.outstanding);
        let first_error = Arc::clone(&self.first_error);

        outstanding.fetch_add(1, Ordering::SeqCst);

        self.units.spawn(async move {
            if let Err(err) = work.await {
                record(&first_error, TaskError::Callback(err));
            }
            outstanding.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Units that have been spawned and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Wait for every unit, then report the first error observed (if any).
    pub async fn wait(mut self) -> Result<(), TaskError> {
        while let Some(joined) = self.units.join_next().await {
            if let Err(join_err) = joined {
                // The unit panicked before it could decrement the counter.
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                let detail = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                record(&self.first_error, TaskError::Panicked(detail));
            }
        }

        // All units are joined and their futures dropped, so this is the
        // last reference to the cell.
        match Arc::into_inner(self.first_error).and_then(OnceLock::into_inner) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn record(slot: &OnceLock<TaskError>, err: TaskError) {
    if let Err(discarded) = slot.set(err) {
        debug!(error = %discarded, "task group already holds an error; discarding later one");
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

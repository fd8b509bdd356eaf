// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The manager talks to a `ProcessBackend` instead of spawning processes
//! itself. Production code uses [`RealProcessRunner`]; tests can provide a
//! fake backend that, for example, records how many runs overlap without
//! starting any OS process.
//!
//! [`RealProcessRunner`]: super::runner::RealProcessRunner

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::errors::RunError;

use super::runner::Invocation;

/// Trait abstracting how a single invocation is executed.
pub trait ProcessBackend: Send + Sync + 'static {
    /// Run `invocation` to completion and return its stdout.
    ///
    /// Implementations should stop early with [`RunError::Cancelled`] once
    /// `cancel` fires.
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RunError>> + Send + 'a>>;
}

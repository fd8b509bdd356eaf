// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`runner`] spawns one process, feeds stdin, captures stdout and
//!   classifies the exit status.
//! - [`gate`] bounds how many processes are in flight.
//! - [`group`] is the completion barrier keeping the first error.
//! - [`manager`] composes the three into `submit` / `join`.
//! - [`backend`] provides the `ProcessBackend` trait so tests can replace
//!   real processes with a fake implementation.

pub mod backend;
pub mod gate;
pub mod group;
pub mod manager;
pub mod runner;

pub use backend::ProcessBackend;
pub use gate::{ConcurrencyGate, GatePermit};
pub use group::TaskGroup;
pub use manager::ConcurrentProcessManager;
pub use runner::{Invocation, ProcessOutcome, RealProcessRunner, classify};
pub use tokio_util::sync::CancellationToken;

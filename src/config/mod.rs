// src/config/mod.rs

//! Batch file configuration: model, loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{BatchFile, BatchTask, ConfigSection, RawBatchFile, TaskConfig};
pub use validate::{default_parallelism, parse_duration};

// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{BatchFile, RawBatchFile};
use crate::errors::Result;

/// Read and deserialize a batch file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawBatchFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawBatchFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a batch file and validate it.
///
/// This is the entry point the CLI uses:
///
/// - Reads TOML.
/// - Resolves defaults (parallelism from the CPU count, task names).
/// - Checks for empty task lists, zero parallelism, empty executables,
///   duplicate names and malformed timeouts.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<BatchFile> {
    let raw = load_from_path(&path)?;
    BatchFile::try_from(raw)
}

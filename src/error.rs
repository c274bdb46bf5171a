//! Recoverable errors.
//!
//! Caller bugs (capacity mismatches, an exhausted buffer pool) panic instead;
//! see the `# Panics` sections on the offending functions.

use thiserror::Error;

/// Errors that can occur while setting up or reading back a sorter.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sort configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid sort configuration: {0}")]
    InvalidConfig(String),

    #[error("GPU initialization failed: {0}")]
    GpuInit(String),

    #[error("GPU readback failed: {0}")]
    Readback(String),

    #[error("Failed to start sort worker: {0}")]
    Spawn(String),
}

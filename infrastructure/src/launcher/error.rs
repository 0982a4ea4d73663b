//! Error types for kernel launching

use nbkernel_domain::KernelError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when discovering or starting a kernel.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("No kernelspec named '{0}'")]
    SpecNotFound(String),

    #[error("Kernelspec '{0}' has an empty argv")]
    EmptyArgv(String),

    #[error("Invalid kernelspec {path}: {reason}")]
    InvalidSpec { path: PathBuf, reason: String },

    #[error("Failed to spawn kernel process {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Interrupting by signal is not supported on this platform")]
    InterruptUnsupported,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LaunchError> for KernelError {
    fn from(e: LaunchError) -> Self {
        KernelError::Connection(e.to_string())
    }
}

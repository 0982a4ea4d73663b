//! Kernelspec (`kernel.json`)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder in `argv` that is replaced by the connection file path.
pub const CONNECTION_FILE_PLACEHOLDER: &str = "{connection_file}";

/// How a kernel wants to be interrupted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptMode {
    /// Send SIGINT to the kernel process.
    #[default]
    Signal,
    /// Send an `interrupt_request` on the control channel.
    Message,
}

/// A launchable kernel description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Directory name the spec was found under (e.g. `python3`).
    #[serde(default)]
    pub name: String,
    pub argv: Vec<String>,
    pub display_name: String,
    pub language: String,
    #[serde(default)]
    pub interrupt_mode: InterruptMode,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl KernelSpec {
    /// Index of the `{connection_file}` argument, if present.
    pub fn connection_file_index(&self) -> Option<usize> {
        self.argv
            .iter()
            .position(|arg| arg.contains(CONNECTION_FILE_PLACEHOLDER))
    }

    /// `argv` with the connection file substituted in.
    pub fn resolved_argv(&self, connection_file: &str) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| arg.replace(CONNECTION_FILE_PLACEHOLDER, connection_file))
            .collect()
    }
}
